//! CLI argument parsing tests.

use super::*;


pub(super) fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).unwrap()
}

pub(super) fn parse_command(args: &[&str]) -> CliCommand {
    parse(args).command
}

#[test]
fn cli_requires_subcommand() {
    assert!(Cli::try_parse_from(["ota"]).is_err());
}

#[test]
fn cli_rejects_unknown_subcommand() {
    assert!(Cli::try_parse_from(["ota", "flash"]).is_err());
}

#[test]
fn cli_build_prop_is_global() {
    let cli = parse(&["ota", "status", "--build-prop", "/tmp/build.prop"]);
    assert_eq!(cli.build_prop, Some(PathBuf::from("/tmp/build.prop")));
    let cli = parse(&["ota", "--build-prop", "b.prop", "mark-current"]);
    assert_eq!(cli.build_prop, Some(PathBuf::from("b.prop")));
    assert!(matches!(cli.command, CliCommand::MarkCurrent));
}

#[test]
fn download_dir_prefers_dest() {
    let cfg = OtaConfig::default();
    let dir = download_dir(&cfg, Some(PathBuf::from("/sdcard/OTA"))).unwrap();
    assert_eq!(dir, PathBuf::from("/sdcard/OTA"));
    let cfg = OtaConfig {
        download_dir: Some(PathBuf::from("/data/ota")),
        ..OtaConfig::default()
    };
    assert_eq!(download_dir(&cfg, None).unwrap(), PathBuf::from("/data/ota"));
}
