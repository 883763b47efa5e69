// aml/tests/common/mod.rs
//
// 結合テスト用の最小 AML アセンブラ。
// 各テストは一部しか使わないので dead_code は許す。

#![allow(dead_code)]

use aml::opcode::*;
use aml::parser::PkgLength;
use aml::NameString;

pub fn pkg(body: &[u8]) -> Vec<u8> {
    for n in 1..=4 {
        let (bytes, used) = PkgLength::encode(body.len() + n).unwrap();
        if used == n {
            let mut out = bytes[..n].to_vec();
            out.extend_from_slice(body);
            return out;
        }
    }
    panic!("body too large: {} bytes", body.len());
}

/// "\_SB_.EC0_" / "^FOO_" / "TEMP" を NameString の byte 列にする
pub fn path(s: &str) -> Vec<u8> {
    let mut out = Vec::new();
    let mut rest = match s.strip_prefix('\\') {
        Some(rest) => {
            out.push(ROOT_CHAR);
            rest
        }
        None => s,
    };
    while let Some(up) = rest.strip_prefix('^') {
        out.push(PARENT_PREFIX_CHAR);
        rest = up;
    }
    let segs: Vec<&str> = rest.split('.').collect();
    match segs.len() {
        1 => {}
        2 => out.push(DUAL_NAME_PREFIX),
        n => {
            out.push(MULTI_NAME_PREFIX);
            out.push(n as u8);
        }
    }
    for seg in segs {
        assert_eq!(seg.len(), 4, "segments are written out in full");
        out.extend_from_slice(seg.as_bytes());
    }
    out
}

pub fn cat(parts: &[&[u8]]) -> Vec<u8> {
    parts.concat()
}

pub fn name(n: &str, value: &[u8]) -> Vec<u8> {
    cat(&[&[NAME_OP], &path(n), value])
}

pub fn scope(n: &str, body: &[u8]) -> Vec<u8> {
    cat(&[&[SCOPE_OP], &pkg(&cat(&[&path(n), body]))])
}

pub fn device(n: &str, body: &[u8]) -> Vec<u8> {
    cat(&[&[EXT_OP_PREFIX, EXT_DEVICE_OP], &pkg(&cat(&[&path(n), body]))])
}

pub fn method(n: &str, args: u8, body: &[u8]) -> Vec<u8> {
    cat(&[&[METHOD_OP], &pkg(&cat(&[&path(n), &[args], body]))])
}

pub fn while_loop(predicate: &[u8], body: &[u8]) -> Vec<u8> {
    cat(&[&[WHILE_OP], &pkg(&cat(&[predicate, body]))])
}

/// If(predicate) { then } Else { otherwise }
pub fn if_else(predicate: &[u8], then: &[u8], otherwise: &[u8]) -> Vec<u8> {
    cat(&[
        &[IF_OP],
        &pkg(&cat(&[predicate, then])),
        &[ELSE_OP],
        &pkg(otherwise),
    ])
}

pub fn byte(v: u8) -> Vec<u8> {
    vec![BYTE_PREFIX, v]
}

pub fn dword(v: u32) -> Vec<u8> {
    cat(&[&[DWORD_PREFIX], &v.to_le_bytes()])
}

pub fn qword(v: u64) -> Vec<u8> {
    cat(&[&[QWORD_PREFIX], &v.to_le_bytes()])
}

/// Buffer(len) { bytes }
pub fn buffer(bytes: &[u8]) -> Vec<u8> {
    cat(&[&[BUFFER_OP], &pkg(&cat(&[&byte(bytes.len() as u8), bytes]))])
}

/// Package(n) { byte 定数 }
pub fn package(values: &[u8]) -> Vec<u8> {
    let elements: Vec<u8> = values.iter().flat_map(|&v| byte(v)).collect();
    cat(&[&[PACKAGE_OP], &pkg(&cat(&[&[values.len() as u8], &elements]))])
}

pub fn string(s: &str) -> Vec<u8> {
    cat(&[&[STRING_PREFIX], s.as_bytes(), &[0]])
}

pub fn ns(s: &str) -> NameString {
    s.parse().unwrap()
}
