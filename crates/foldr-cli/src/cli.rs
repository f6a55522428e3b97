use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use foldr_core::FolderOrder;

/// Command-line arguments accepted by the `foldr` binary.
#[derive(Parser, Debug)]
#[command(
    name = "foldr",
    version,
    about = "Browse folders, archives, bookmarks and playlists as one tree"
)]
pub(crate) struct CliArgs {
    #[arg(
        short,
        long,
        value_name = "FILE",
        global = true,
        help = "Configuration file to use instead of the default locations"
    )]
    pub(crate) config: Option<PathBuf>,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// List the items of a location (`/some/dir`, `file:/a.zip/ch1`, `bookmark:`, `root:` ...).
    Ls {
        location: String,
        #[arg(short, long, value_enum)]
        order: Option<OrderArg>,
        #[arg(long, default_value_t = 0, help = "Seed for the random order")]
        seed: u64,
    },
    /// Search a directory for a keyword.
    Search { dir: PathBuf, keyword: String },
    /// Walk depth-first from a location.
    Cruise {
        location: String,
        #[arg(default_value_t = 1)]
        steps: usize,
        #[arg(long, help = "Walk backwards")]
        prev: bool,
        #[arg(long, value_name = "LOCATION", help = "Do not walk above this location")]
        root: Option<String>,
    },
    /// Print changes to a directory until interrupted.
    Watch { dir: PathBuf },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OrderArg {
    Name,
    NameDesc,
    Path,
    PathDesc,
    Type,
    TypeDesc,
    Time,
    TimeDesc,
    Entry,
    EntryDesc,
    Size,
    SizeDesc,
    Random,
}

impl From<OrderArg> for FolderOrder {
    fn from(arg: OrderArg) -> Self {
        match arg {
            OrderArg::Name => FolderOrder::FileName,
            OrderArg::NameDesc => FolderOrder::FileNameDescending,
            OrderArg::Path => FolderOrder::Path,
            OrderArg::PathDesc => FolderOrder::PathDescending,
            OrderArg::Type => FolderOrder::FileType,
            OrderArg::TypeDesc => FolderOrder::FileTypeDescending,
            OrderArg::Time => FolderOrder::TimeStamp,
            OrderArg::TimeDesc => FolderOrder::TimeStampDescending,
            OrderArg::Entry => FolderOrder::EntryTime,
            OrderArg::EntryDesc => FolderOrder::EntryTimeDescending,
            OrderArg::Size => FolderOrder::Size,
            OrderArg::SizeDesc => FolderOrder::SizeDescending,
            OrderArg::Random => FolderOrder::Random,
        }
    }
}
