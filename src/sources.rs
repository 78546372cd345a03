use anyhow::Result;

use crate::config::Config;
use crate::index::{self, IndexStatus};
use crate::loader;

pub async fn run_sources(config: &Config) -> Result<()> {
    match index::load_index(config).await {
        IndexStatus::Ready(index) => {
            let files = index.source_files();
            println!(
                "Indexed sources ({} files, {} chunks, built {}):",
                files.len(),
                index.len(),
                index.header().built_at
            );
            for file in files {
                println!("  {}", file);
            }
        }
        status => {
            if let IndexStatus::Unreadable(reason) = &status {
                println!("Knowledge base could not be read: {}", reason);
            } else {
                println!("Knowledge base has not been built yet.");
            }
            let files = loader::list_data_files(&config.paths.data_dir);
            if files.is_empty() {
                println!("No files in {}.", config.paths.data_dir.display());
            } else {
                println!("Files in {}:", config.paths.data_dir.display());
                for file in files {
                    println!("  {}", file);
                }
            }
            println!("Run `docqa rebuild` to index them.");
        }
    }
    Ok(())
}
