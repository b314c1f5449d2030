use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "codechat",
    version,
    about = "Ask a human to review uncommitted changes",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
    #[command(flatten)]
    pub review: ReviewArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start an interactive code review (default)
    Review(ReviewArgs),
    /// Print a stored session as JSON
    GetSession {
        session_id: String,
    },
    /// List sessions for the current repository
    Sessions,
    /// Serve the review tools over MCP on stdio
    Mcp,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ReviewArgs {
    /// Reuse an existing session
    #[arg(short = 's', long)]
    pub session_id: Option<String>,
    /// Description of what changed
    #[arg(short, long)]
    pub message: Option<String>,
    /// JSON array of replies (use - for stdin)
    #[arg(short, long, value_name = "JSON|-")]
    pub replies: Option<String>,
    /// Return the result without opening the browser
    #[arg(long)]
    pub skip_review: bool,
    /// Use a specific port (default: random)
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,
    /// Session timeout in minutes (default: 30)
    #[arg(short, long, value_name = "MINUTES", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,
    /// Don't open the browser automatically
    #[arg(long)]
    pub no_open: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_flags_mean_review() {
        let cli = Cli::try_parse_from(["codechat", "-m", "Renamed foo", "--skip-review"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.review.message.as_deref(), Some("Renamed foo"));
        assert!(cli.review.skip_review);
    }

    #[test]
    fn review_subcommand_takes_the_same_flags() {
        let cli = Cli::try_parse_from(["codechat", "review", "-r", "-", "-t", "5", "--no-open"]).unwrap();
        let Some(Command::Review(args)) = cli.command else {
            panic!("expected review command");
        };
        assert_eq!(args.replies.as_deref(), Some("-"));
        assert_eq!(args.timeout, Some(5));
        assert!(args.no_open);
    }

    #[test]
    fn zero_port_is_rejected() {
        assert!(Cli::try_parse_from(["codechat", "review", "-p", "0"]).is_err());
    }

    #[test]
    fn get_session_needs_an_id() {
        assert!(Cli::try_parse_from(["codechat", "get-session"]).is_err());
        let cli = Cli::try_parse_from(["codechat", "get-session", "ses_1"]).unwrap();
        assert!(matches!(cli.command, Some(Command::GetSession { session_id }) if session_id == "ses_1"));
    }
}
