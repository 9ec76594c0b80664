use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "protokoll")]
#[command(about = "Meeting recorder with automatic result protocols", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Print version information
    Version,
    /// List recorded sessions or show one in full
    Sessions(SessionsCliArgs),
}

#[derive(ClapArgs, Debug)]
pub struct SessionsCliArgs {
    /// ID of a specific session to show with transcript and summary
    #[arg(short, long)]
    pub id: Option<String>,
    /// Maximum number of sessions to list
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}
