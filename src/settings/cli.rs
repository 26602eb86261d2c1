use super::Parser;

#[derive(Parser, Debug)]
#[command(name = "authcore", about = "Session and token service")]
pub struct Cli {
    /// Path to the settings file. Defaults to settings/dev.toml in debug builds.
    #[arg(long)]
    pub settings: Option<String>,
}
