use crate::db::DB;
use rocksdb::{BlockBasedOptions, DBCompressionType};
use std::{path::PathBuf, sync::Arc};

const KB: usize = 1024;
const MB: usize = 1024 * KB;

#[derive(Debug)]
pub struct Unspecified;

/// Typed builder for opening the node database. The path must be specified before `build` is available
#[derive(Debug)]
pub struct ConnBuilder<Path> {
    db_path: Path,
    create_if_missing: bool,
    parallelism: usize,
    files_limit: i32,
    mem_budget: usize,
}

impl Default for ConnBuilder<Unspecified> {
    fn default() -> Self {
        ConnBuilder { db_path: Unspecified, create_if_missing: true, parallelism: 1, files_limit: 500, mem_budget: 64 * MB }
    }
}

impl<Path> ConnBuilder<Path> {
    pub fn with_db_path(self, db_path: PathBuf) -> ConnBuilder<PathBuf> {
        ConnBuilder {
            db_path,
            create_if_missing: self.create_if_missing,
            parallelism: self.parallelism,
            files_limit: self.files_limit,
            mem_budget: self.mem_budget,
        }
    }

    pub fn with_create_if_missing(self, create_if_missing: bool) -> Self {
        ConnBuilder { create_if_missing, ..self }
    }

    pub fn with_parallelism(self, parallelism: impl Into<usize>) -> Self {
        ConnBuilder { parallelism: parallelism.into(), ..self }
    }

    pub fn with_files_limit(self, files_limit: impl Into<i32>) -> Self {
        ConnBuilder { files_limit: files_limit.into(), ..self }
    }

    pub fn with_mem_budget(self, mem_budget: impl Into<usize>) -> Self {
        ConnBuilder { mem_budget: mem_budget.into(), ..self }
    }
}

impl ConnBuilder<PathBuf> {
    pub fn build(self) -> Result<Arc<DB>, rocksdb::Error> {
        let mut opts = rocksdb::Options::default();
        if self.parallelism > 1 {
            opts.increase_parallelism(self.parallelism as i32);
        }
        opts.optimize_level_style_compaction(self.mem_budget);
        opts.set_write_buffer_size(32 * MB);
        opts.set_keep_log_file_num(1);
        opts.set_bytes_per_sync(MB as u64);
        opts.set_compression_per_level(&[
            DBCompressionType::None,
            DBCompressionType::Lz4,
            DBCompressionType::Lz4,
            DBCompressionType::Lz4,
            DBCompressionType::Lz4,
            DBCompressionType::Lz4,
            DBCompressionType::Lz4,
        ]);

        let mut b_opts = BlockBasedOptions::default();
        b_opts.set_bloom_filter(4.9, true);
        b_opts.set_block_size(128 * KB);
        opts.set_block_based_table_factory(&b_opts);

        opts.set_max_open_files(self.files_limit);
        opts.create_if_missing(self.create_if_missing);
        Ok(Arc::new(DB::open(&opts, self.db_path)?))
    }
}
