use clap::Parser;

use crate::utils::version;

#[derive(Parser, Debug)]
#[command(author, version = version(), about)]
pub struct Cli {
    #[arg(
        short,
        long,
        value_name = "FLOAT",
        help = "Tick rate, i.e. number of ticks per second",
        default_value_t = 1.0
    )]
    pub tick_rate: f64,

    #[arg(
        short,
        long,
        value_name = "FLOAT",
        help = "Frame rate, i.e. number of frames per second",
        default_value_t = 4.0
    )]
    pub frame_rate: f64,

    #[arg(
        short,
        long,
        value_name = "URI",
        help = "Address of the EEG2BIDS backend, overrides the configured one"
    )]
    pub backend: Option<String>,

    #[arg(long, value_name = "MILLISECONDS", help = "How long the splash screen stays up")]
    pub splash_ms: Option<u64>,

    #[arg(long, help = "Run without connecting to a backend")]
    pub offline: bool,
}
