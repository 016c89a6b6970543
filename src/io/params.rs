use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use crate::{error::Result, upsampler::UpsampleParams};

impl UpsampleParams {
    /// Loads parameters from a JSON file. Missing fields take their default.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let buffer = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(buffer)?)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let buffer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(buffer, self)?;
        Ok(())
    }
}
