use super::*;

// The following tests come from the solidity documentation:
// https://docs.soliditylang.org/en/v0.8.17/abi-spec.html#examples
//
// The code below intentionally does NOT include the method ID (4 bytes), see
// the `selectors` test for those.

/*
contract Foo {
    function bar(bytes3[2] memory) public pure {}
    function baz(uint32 x, bool y) public pure returns (bool r) { r = x > 32 || y; }
    function sam(bytes memory, bool, uint[] memory) public pure {}
}
*/
#[test]
fn foo_baz() {
    let expected = "
0000000000000000000000000000000000000000000000000000000000000045
0000000000000000000000000000000000000000000000000000000000000001
    ";
    encode_and_compare(&[Token::uint(69u64), Token::Bool(true)], expected);
}

#[test]
fn foo_baz_return() {
    encode_and_compare(
        &[Token::Bool(true)],
        "0000000000000000000000000000000000000000000000000000000000000001",
    );
    encode_and_compare(
        &[Token::Bool(false)],
        "0000000000000000000000000000000000000000000000000000000000000000",
    );
}

#[test]
fn foo_bar() {
    let expected = "
6162630000000000000000000000000000000000000000000000000000000000
6465660000000000000000000000000000000000000000000000000000000000
    ";
    let bar = Token::FixedArray(vec![
        Token::FixedBytes(b"abc".to_vec()),
        Token::FixedBytes(b"def".to_vec()),
    ]);
    encode_and_compare(&[bar], expected);
}

#[test]
fn foo_sam() {
    let expected = "
0000000000000000000000000000000000000000000000000000000000000060 // [0] (bytes) offset
0000000000000000000000000000000000000000000000000000000000000001 // [1] (bool)
00000000000000000000000000000000000000000000000000000000000000a0 // [2] (uint[]) offset
    0000000000000000000000000000000000000000000000000000000000000004 // [0] (bytes) length
    6461766500000000000000000000000000000000000000000000000000000000 // [0] (bytes)

    0000000000000000000000000000000000000000000000000000000000000003 // [2] (uint[]) length
    0000000000000000000000000000000000000000000000000000000000000001 // [2][0]
    0000000000000000000000000000000000000000000000000000000000000002 // [2][1]
    0000000000000000000000000000000000000000000000000000000000000003 // [2][2]
        ";
    encode_and_compare(
        &[
            Token::Bytes(b"dave".to_vec()),
            Token::Bool(true),
            Token::Array(uints(&[1, 2, 3])),
        ],
        expected,
    );
}

#[test]
fn dynamictypes_f() {
    /*
    f(uint256,uint32[],bytes10,bytes)
    */
    let expected = "
0000000000000000000000000000000000000000000000000000000000000123 // [0]
0000000000000000000000000000000000000000000000000000000000000080 // [1] offset
3132333435363738393000000000000000000000000000000000000000000000 // [2]
00000000000000000000000000000000000000000000000000000000000000e0 // [3] offset
    0000000000000000000000000000000000000000000000000000000000000002 // [1] length
    0000000000000000000000000000000000000000000000000000000000000456 // [1][0]
    0000000000000000000000000000000000000000000000000000000000000789 // [1][1]

    000000000000000000000000000000000000000000000000000000000000000d // [3] length
    48656c6c6f2c20776f726c642100000000000000000000000000000000000000 // [3]
    ";

    encode_and_compare(
        &[
            Token::uint(0x123u64),
            Token::Array(uints(&[0x456, 0x789])),
            Token::FixedBytes(b"1234567890".to_vec()),
            Token::Bytes(b"Hello, world!".to_vec()),
        ],
        expected,
    );
}

#[test]
fn dynamictypes_g() {
    /*
    g(uint256[][],string[])
    */
    let expected = "
0000000000000000000000000000000000000000000000000000000000000040 // offset of [[1, 2], [3]]
0000000000000000000000000000000000000000000000000000000000000140 // offset of [\"one\", \"two\", \"three\"]
    0000000000000000000000000000000000000000000000000000000000000002 // count for [[1, 2], [3]]
    0000000000000000000000000000000000000000000000000000000000000040 // offset of [1, 2]
    00000000000000000000000000000000000000000000000000000000000000a0 // offset of [3]
        0000000000000000000000000000000000000000000000000000000000000002 // count for [1, 2]
        0000000000000000000000000000000000000000000000000000000000000001 // encoding of 1
        0000000000000000000000000000000000000000000000000000000000000002 // encoding of 2

        0000000000000000000000000000000000000000000000000000000000000001 // count for [3]
        0000000000000000000000000000000000000000000000000000000000000003 // encoding of 3

    0000000000000000000000000000000000000000000000000000000000000003 // count for [\"one\", \"two\", \"three\"]
    0000000000000000000000000000000000000000000000000000000000000060 // offset for \"one\"
    00000000000000000000000000000000000000000000000000000000000000a0 // offset for \"two\"
    00000000000000000000000000000000000000000000000000000000000000e0 // offset for \"three\"
        0000000000000000000000000000000000000000000000000000000000000003 // count for \"one\"
        6f6e650000000000000000000000000000000000000000000000000000000000 // encoding of \"one\"

        0000000000000000000000000000000000000000000000000000000000000003 // count for \"two\"
        74776f0000000000000000000000000000000000000000000000000000000000 // encoding of \"two\"

        0000000000000000000000000000000000000000000000000000000000000005 // count for \"three\"
        7468726565000000000000000000000000000000000000000000000000000000 // encoding of \"three\"
    ";

    let nested = Token::Array(vec![
        Token::Array(uints(&[1, 2])),
        Token::Array(uints(&[3])),
    ]);
    let strings = Token::Array(
        ["one", "two", "three"]
            .iter()
            .map(|s| Token::String(s.to_string()))
            .collect(),
    );

    encode_and_compare(&[nested, strings], expected);
}

#[test]
fn selectors() {
    assert_eq!(selector("baz(uint32,bool)"), [0xcd, 0xcd, 0x77, 0xc0]);
    assert_eq!(selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
}

#[test]
fn oversized_fixed_bytes_are_rejected() {
    let err = encode(&[Token::FixedBytes(vec![0; 33])]).unwrap_err();
    assert_eq!(err, Error::InvalidFixedBytesLength(33));
}
