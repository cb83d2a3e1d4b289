use serde::Deserialize;
use std::{collections::BTreeMap, env, fs, path::PathBuf};

/// Layout of `flags.json`: one table per generated constant type.
#[derive(Deserialize)]
struct FlagFile {
    #[serde(rename = "u32", default)]
    words: BTreeMap<String, String>,
    #[serde(rename = "usize", default)]
    sizes: BTreeMap<String, String>,
    #[serde(rename = "str", default)]
    strings: BTreeMap<String, String>,
}

fn parse_num(num_str: &str) -> u64 {
    let clean = num_str.trim().replace("_", "");
    let res = match clean.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => clean.parse::<u64>(),
    };
    res.unwrap_or_else(|err| panic!("Invalid numeric flag '{}': {:?}", num_str, err))
}

fn main() {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let flags_path = PathBuf::from(manifest_dir).join("../../flags.json");
    let flags_str = fs::read_to_string(&flags_path).unwrap();
    let flags: FlagFile = serde_json::from_str(&flags_str).unwrap();
    make_flags(&flags);
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=../../flags.json");
}

fn make_flags(flags: &FlagFile) {
    let mut s = String::new();
    for (key, value) in &flags.words {
        let value = u32::try_from(parse_num(value))
            .unwrap_or_else(|_| panic!("Flag '{}' does not fit in u32.", key));
        s += format!("pub const {}: u32 = {:#x};\n", key, value).as_str();
    }
    for (key, value) in &flags.sizes {
        s += format!("pub const {}: usize = {:#x};\n", key, parse_num(value)).as_str();
    }
    for (key, value) in &flags.strings {
        s += format!("pub const {}: &str = {:?};\n", key, value).as_str();
    }
    let out_dir = env::var("OUT_DIR").unwrap();
    let path = PathBuf::from(out_dir).join("build_flags.rs");
    fs::write(path, s).unwrap();
}
