use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a bulk position refresh over a synthetic fleet
    Refresh {
        #[arg(long, default_value_t = 2500, help = "Fleet size to generate")]
        vehicles: usize,

        #[arg(long, default_value_t = 0, help = "Batch size (0 = adaptive)")]
        batch_size: usize,

        #[arg(
            long,
            default_value_t = 0,
            help = "Max batches in flight (0 = machine parallelism)"
        )]
        parallelism: usize,

        #[arg(long, help = "Make batches containing this line fail, to exercise error draining")]
        fail_line: Option<String>,

        #[arg(
            long,
            default_value_t = 250,
            help = "Minimum milliseconds between progress lines"
        )]
        progress_interval_ms: u64,
    },
    /// Show the batch plan for a fleet size without running it
    Plan {
        #[arg(long, default_value_t = 2500, help = "Fleet size")]
        vehicles: usize,

        #[arg(long, default_value_t = 0, help = "Batch size (0 = adaptive)")]
        batch_size: usize,

        #[arg(long, default_value_t = 0, help = "Parallelism (0 = machine parallelism)")]
        parallelism: usize,
    },
}
