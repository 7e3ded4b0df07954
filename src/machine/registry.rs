use std::{collections::HashMap, sync::Arc};

use crate::{
    protocol::{
        InstallFlow, ProposeFlow, Protocol, SetupFlow, TakeActionFlow, UninstallFlow,
        WithdrawFlow,
    },
    Error, Result,
};

use super::ProtocolFlow;

/// Which [ProtocolFlow] runs a [Protocol].
#[derive(Debug, Clone)]
pub struct FlowRegistry {
    flows: HashMap<Protocol, Arc<dyn ProtocolFlow>>,
}

impl Default for FlowRegistry {
    /// All six built-in flows.
    fn default() -> Self {
        let flows: [Arc<dyn ProtocolFlow>; 6] = [
            Arc::new(SetupFlow),
            Arc::new(ProposeFlow),
            Arc::new(InstallFlow),
            Arc::new(TakeActionFlow),
            Arc::new(UninstallFlow),
            Arc::new(WithdrawFlow),
        ];
        Self {
            flows: flows.into_iter().map(|f| (f.protocol(), f)).collect(),
        }
    }
}

impl FlowRegistry {
    pub fn builder() -> FlowRegistryBuilder {
        FlowRegistryBuilder::default()
    }

    pub fn get(&self, protocol: Protocol) -> Result<&Arc<dyn ProtocolFlow>> {
        self.flows
            .get(&protocol)
            .ok_or_else(|| Error::UnexpectedMessage(format!("no flow registered for {}", protocol)))
    }
}

#[derive(Debug, Default)]
pub struct FlowRegistryBuilder {
    flows: HashMap<Protocol, Arc<dyn ProtocolFlow>>,
}

impl FlowRegistryBuilder {
    pub fn register(mut self, flow: impl ProtocolFlow + 'static) -> Result<Self> {
        let protocol = flow.protocol();
        if self.flows.contains_key(&protocol) {
            return Err(Error::DuplicateRegistration(format!("{} flow", protocol)));
        }
        self.flows.insert(protocol, Arc::new(flow));
        Ok(self)
    }

    pub fn build(self) -> FlowRegistry {
        FlowRegistry { flows: self.flows }
    }
}
