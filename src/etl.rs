pub mod parse_osm;

use std::path::Path;

use log::{error, info};

use crate::errors::Result;

/// One cached step of the pipeline. `process` skips the step when its output
/// already exists in `dir`.
pub trait Etl {
    type Input;
    type Output;

    fn etl_name(&self) -> &str;

    fn is_cached(&self, dir: &Path) -> Result<bool>;
    fn clean(&self, dir: &Path) -> Result<()>;

    fn extract(&mut self, dir: &Path) -> Result<Self::Input>;
    fn transform(&mut self, input: Self::Input) -> Result<Self::Output>;
    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()>;

    fn process(&mut self, dir: &Path) -> Result<()> {
        info!(etl_name = self.etl_name(); "Starting ETL process");
        if self.is_cached(dir)? {
            info!(etl_name = self.etl_name(); "Using cached value");
        } else {
            info!(etl_name = self.etl_name(); "Extracting");
            let extracted = self.extract(dir);
            let input = log_failure(self.etl_name(), "Extraction", extracted)?;

            info!(etl_name = self.etl_name(); "Transforming");
            let transformed = self.transform(input);
            let output = log_failure(self.etl_name(), "Transformation", transformed)?;

            info!(etl_name = self.etl_name(); "Loading");
            let loaded = self.load(dir, output);
            log_failure(self.etl_name(), "Loading", loaded)?;
        }
        info!(etl_name = self.etl_name(); "Process finished");
        Ok(())
    }
}

fn log_failure<T>(etl_name: &str, phase: &str, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        let message = err.to_string();
        error!(etl_name = etl_name, phase = phase, err = message.as_str(); "ETL phase failed with error");
    }
    result
}
