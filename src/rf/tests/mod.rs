mod graph_backend;

fn setup_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
