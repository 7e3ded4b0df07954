use super::*;

/*
A state struct with nested dynamic members, checked against remix.

```solidity
struct Asset { uint256 chainID; address holder; }
struct Allocation { Asset[] assets; uint256[][] balances; SubAlloc[] locked; }
struct State { bytes32 channelID; uint64 version; Allocation outcome; bytes appData; bool isFinal; }

function get_state() internal pure returns(State memory) {
    State memory s;
    s.channelID = "1111";
    s.version = 0x2222;
    s.outcome.assets = new Asset[](1);
    s.outcome.assets[0].chainID = 0x3333;
    s.outcome.assets[0].holder = 0x5B38Da6a701c568545dCfcB03FcB875f56beddC4;
    s.outcome.balances = new uint256[][](1);
    s.outcome.balances[0] = new uint256[](2);
    s.outcome.balances[0][0] = 0x5555;
    s.outcome.balances[0][1] = 0x6666;
    s.appData = "";
    s.isFinal = true;
    return s;
}
```
*/
fn build_test_state() -> Token {
    // Random address from etherscan, do not use!
    let holder: Address = "5B38Da6a701c568545dCfcB03FcB875f56beddC4".parse().unwrap();

    let mut id = b"1111".to_vec();
    id.resize(32, 0);

    Token::Tuple(vec![
        Token::FixedBytes(id),
        Token::uint(0x2222u64),
        Token::Tuple(vec![
            Token::Array(vec![Token::Tuple(vec![
                Token::uint(0x3333u64),
                Token::Address(holder),
            ])]),
            Token::Array(vec![Token::Array(uints(&[0x5555, 0x6666]))]),
            Token::Array(vec![]),
        ]),
        Token::Bytes(vec![]),
        Token::Bool(true),
    ])
}

#[test]
fn nested_state_encode() {
    let expected = "
        0000000000000000000000000000000000000000000000000000000000000020 // offset of the struct
        3131313100000000000000000000000000000000000000000000000000000000
        0000000000000000000000000000000000000000000000000000000000002222
        00000000000000000000000000000000000000000000000000000000000000a0 // outcome offset
        0000000000000000000000000000000000000000000000000000000000000220 // appData offset
        0000000000000000000000000000000000000000000000000000000000000001
        0000000000000000000000000000000000000000000000000000000000000060 // assets offset
        00000000000000000000000000000000000000000000000000000000000000c0 // balances offset
        0000000000000000000000000000000000000000000000000000000000000160 // locked offset
        0000000000000000000000000000000000000000000000000000000000000001
        0000000000000000000000000000000000000000000000000000000000003333
        0000000000000000000000005b38da6a701c568545dcfcb03fcb875f56beddc4
        0000000000000000000000000000000000000000000000000000000000000001
        0000000000000000000000000000000000000000000000000000000000000020
        0000000000000000000000000000000000000000000000000000000000000002
        0000000000000000000000000000000000000000000000000000000000005555
        0000000000000000000000000000000000000000000000000000000000006666
        0000000000000000000000000000000000000000000000000000000000000000 // no locked funds
        0000000000000000000000000000000000000000000000000000000000000000 // empty appData
        ";

    encode_and_compare(&[build_test_state()], expected)
}

#[test]
fn nested_state_hash() {
    let hash = to_hash(&[build_test_state()]).unwrap();

    let expected: Hash = "e7518ad2414d38370ea5f21f1351eabce47480ab191c984ac12a3aedf70eda3d"
        .parse()
        .unwrap();

    assert_eq!(hash, expected);
}

#[test]
fn tokens_survive_json() {
    let state = build_test_state();
    let json = serde_json::to_string(&state).unwrap();
    assert_eq!(serde_json::from_str::<Token>(&json).unwrap(), state);
}
