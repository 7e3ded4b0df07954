//! App logic plug-in point.
//!
//! The engine never interprets app states itself. Taking an action and
//! computing an outcome are delegated to the [AppLogic] registered for the
//! app's definition address.

mod simple_transfer;

use std::{collections::HashMap, fmt::Debug, sync::Arc};

use crate::{
    abiencode::{types::Address, Token},
    model::AppOutcome,
    Error, Result,
};

pub use simple_transfer::SimpleTransferApp;

pub trait AppLogic: Debug + Send + Sync {
    /// Pure state transition. Both parties run it and must arrive at the same
    /// state.
    fn apply_action(&self, state: &Token, action: &Token) -> Result<Token>;

    /// Outcome of `state`. `block_number` is provided for apps that declare
    /// [AppLogic::requires_block_number].
    fn compute_outcome(&self, state: &Token, block_number: Option<u64>) -> Result<AppOutcome>;

    fn requires_block_number(&self) -> bool {
        false
    }
}

#[derive(Debug, Default, Clone)]
pub struct AppRegistry {
    apps: HashMap<Address, Arc<dyn AppLogic>>,
}

impl AppRegistry {
    pub fn builder() -> AppRegistryBuilder {
        AppRegistryBuilder::default()
    }

    pub fn get(&self, app_definition: &Address) -> Result<&Arc<dyn AppLogic>> {
        self.apps
            .get(app_definition)
            .ok_or(Error::UnknownAppDefinition(*app_definition))
    }

    pub fn contains(&self, app_definition: &Address) -> bool {
        self.apps.contains_key(app_definition)
    }
}

#[derive(Debug, Default)]
pub struct AppRegistryBuilder {
    apps: HashMap<Address, Arc<dyn AppLogic>>,
}

impl AppRegistryBuilder {
    /// Registering the same definition twice is a configuration error.
    pub fn register(
        mut self,
        app_definition: Address,
        logic: impl AppLogic + 'static,
    ) -> Result<Self> {
        if self.apps.contains_key(&app_definition) {
            return Err(Error::DuplicateRegistration(format!(
                "app definition {}",
                app_definition
            )));
        }
        self.apps.insert(app_definition, Arc::new(logic));
        Ok(self)
    }

    pub fn build(self) -> AppRegistry {
        AppRegistry { apps: self.apps }
    }
}
