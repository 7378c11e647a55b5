pub mod binding_store;
pub mod candidate_directory;
pub mod clock;
pub mod config;
pub mod contract;
pub mod dispatcher;
pub mod icon_cache;
pub mod launcher;
pub mod logging;
pub mod model;
pub mod request;
pub mod resolver;
pub mod runtime;
pub mod shell_opener;
pub mod shortcut_file;
pub mod shortcut_index;
pub mod special_type;
pub mod store;
pub mod transport;

#[cfg(test)]
mod tests {
    mod shortcut_lookup_latency_test {
        include!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../../tests/perf/shortcut_lookup_latency_test.rs"
        ));
    }
}
