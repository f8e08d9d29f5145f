//! Generates `manifest_api.rs` with the manifest API version plugins are
//! checked against, taken from `[package.metadata.plugin-resolver]`.

use std::env;
use std::fs;
use std::path::PathBuf;

const METADATA_TABLE: &str = "plugin-resolver";

fn main() {
    println!("cargo:rerun-if-changed=Cargo.toml");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR is set by cargo"));
    let cargo_toml: toml::Table = fs::read_to_string(manifest_dir.join("Cargo.toml"))
        .expect("Cargo.toml is readable")
        .parse()
        .expect("Cargo.toml is valid TOML");

    let api_version = cargo_toml
        .get("package")
        .and_then(|package| package.get("metadata"))
        .and_then(|metadata| metadata.get(METADATA_TABLE))
        .and_then(|table| table.get("api_version"))
        .and_then(toml::Value::as_integer)
        .and_then(|version| u32::try_from(version).ok())
        .unwrap_or_else(|| panic!("package.metadata.{}.api_version must be a YYYYMMDD integer", METADATA_TABLE));

    let out = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo")).join("manifest_api.rs");
    fs::write(out, format!("pub const BASE_API_VERSION: u32 = {};\n", api_version))
        .expect("OUT_DIR is writable");
}
