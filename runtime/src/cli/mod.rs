//! CLI subcommand implementations for the damlog binary.

pub mod normalize_cmd;
pub mod run_cmd;
pub mod serve;

/// Print a value as pretty JSON on stdout.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
