use std::sync::Arc;

use anyhow::Error;
use aws_config::BehaviorVersion;
use common_blob::folder::FolderBlobSource;
use common_blob::s3::S3BlobSource;
use common_blob::BlobSource;
use tracing::info;

use crate::config::{BlobSourceKind, Config, WarehouseKind};
use crate::loader::BatchLoader;
use crate::pipeline::IngestionPipeline;
use crate::tokenizer::Tokenizer;
use crate::warehouse::memory::MemoryWarehouse;
use crate::warehouse::postgres::PgWarehouse;
use crate::warehouse::Warehouse;

pub struct AppContext {
    pub pipeline: IngestionPipeline,
}

impl AppContext {
    pub async fn new(config: &Config) -> Result<Self, Error> {
        let source = blob_source(config).await;
        let warehouse = warehouse(config)?;
        let tokenizer = Tokenizer::new(config.tokenizer_mode);
        let loader = BatchLoader::new(warehouse, config.load_timeout.0);

        Ok(Self {
            pipeline: IngestionPipeline::new(source, tokenizer, loader),
        })
    }
}

async fn blob_source(config: &Config) -> Arc<dyn BlobSource> {
    match config.blob_source {
        BlobSourceKind::S3 => {
            let mut aws_config_builder = aws_config::defaults(BehaviorVersion::latest());
            if let Some(endpoint) = &config.aws_endpoint_url {
                aws_config_builder = aws_config_builder.endpoint_url(endpoint);
            }
            let aws_config = aws_config_builder.load().await;

            let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&aws_config);
            if config.aws_endpoint_url.is_some() {
                s3_config_builder = s3_config_builder.force_path_style(true);
            }

            let client = aws_sdk_s3::Client::from_conf(s3_config_builder.build());
            Arc::new(S3BlobSource::new(client))
        }
        BlobSourceKind::Folder => {
            info!("reading blobs from {}", config.blob_folder);
            Arc::new(FolderBlobSource::new(&config.blob_folder))
        }
    }
}

fn warehouse(config: &Config) -> Result<Arc<dyn Warehouse>, Error> {
    match config.warehouse {
        WarehouseKind::Postgres => {
            let connection = &config.warehouse_connection;
            info!(
                "loading into {} on {}:{}",
                connection.destination, connection.host, connection.port
            );
            Ok(Arc::new(PgWarehouse::from_config(connection)?))
        }
        WarehouseKind::Memory => {
            info!("loading into an in-memory warehouse, nothing will be persisted");
            Ok(Arc::new(MemoryWarehouse::new()))
        }
    }
}
