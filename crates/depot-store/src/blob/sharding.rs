use std::path::{Path, PathBuf};

/// Path of a blob: `<root>/<first 2 digest chars>/<digest>.json`
pub fn shard_path(root: &Path, digest: &str) -> PathBuf {
    let shard = &digest[..2.min(digest.len())];
    root.join(shard).join(format!("{}.json", digest))
}
