fn main() -> anyhow::Result<()> {
    let config = vkfw_generator::Config::from_env()?;
    vkfw_generator::logger::init(config.log_level)?;
    vkfw_generator::generate(&config)
}
