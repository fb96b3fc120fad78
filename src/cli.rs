use clap::ValueEnum;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Progress bar on stderr
    #[default]
    Progress,
    /// One JSON state snapshot per line on stdout
    Json,
    /// Only the final path
    Quiet,
}
