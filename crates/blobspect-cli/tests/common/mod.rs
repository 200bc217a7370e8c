use assert_cmd::Command;
use std::path::PathBuf;

pub fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("blobspect").expect("blobspect binary");
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Path of a checked-in blob under the workspace's fixtures directory
pub fn fixture(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures")
        .join(name)
        .to_str()
        .expect("fixture path utf8")
        .to_string()
}
