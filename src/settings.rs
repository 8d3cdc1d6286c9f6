//! User-facing options for the patches and the tools.

use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use eyre::Result;
use serde::{Deserialize, Serialize};

/// Name of the options file looked for next to the ROM.
pub const OPTIONS_FILE_NAME: &str = "precomp.json";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Enables the debug instrumentation in the patches: the startup banner and the splash state
    /// trace. Defaults to on in builds with the `debug` feature.
    pub debug: bool,

    /// Prints heap usage to the debug overlay every frame. Only takes effect with `debug`.
    pub heap_stats: bool,

    /// Where log messages are written. Standard error is used if this isn't set.
    pub log_path: Option<PathBuf>,

    /// `host:port` to send log messages to over UDP. Only used in `debug` builds.
    pub log_address: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            debug: cfg!(feature = "debug"),
            heap_stats: false,
            log_path: None,
            log_address: None,
        }
    }
}

impl Options {
    /// Attempts to parse the contents of `reader` to get an `Options` value.
    pub fn parse_json(reader: impl Read) -> Result<Options> {
        // Coerce with `?`.
        Ok(serde_json::from_reader(reader)?)
    }

    /// Looks for an options file at `path` and loads it.
    fn load_from_file(path: &Path) -> Result<Option<Options>> {
        if !path.exists() {
            // This isn't an error, but we didn't find any options.
            return Ok(None);
        }

        Ok(Some(Options::parse_json(File::open(path)?)?))
    }

    /// Either loads the options from `path` or generates default values for them.
    pub fn load(path: &Path) -> Options {
        match Options::load_from_file(path) {
            Ok(Some(options)) => return options,

            Ok(None) => log::info!(
                "No options file at {}. Defaults will be used.",
                path.display()
            ),

            Err(err) => {
                log::error!("Error loading options file: {err:?}. Defaults will be used.")
            }
        };

        Options::default()
    }

    /// Saves the options to `path`, returning any errors encountered.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;

        log::info!("Options saved to {}.", path.display());
        Ok(())
    }
}
