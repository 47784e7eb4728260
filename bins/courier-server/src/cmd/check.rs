use courier_engine::TopicRouteSupervisor;
use courier_engine::config::CourierConfig;

use crate::config::ConfigArgs;
use crate::error::ServerError;

pub fn run(args: ConfigArgs) -> Result<(), ServerError> {
    let config = CourierConfig::load(&args.config)?;
    let subscriptions = TopicRouteSupervisor::plan(&config.kafka)?;

    println!("config ok: {}", args.config);
    println!("broker: {:?}, group: {}", config.broker, config.kafka.group_id);
    for s in &subscriptions {
        println!("  {} <- {}", s.route_id, s.topic);
    }
    Ok(())
}
