use clap::Parser;
use env_logger::Env;
use log::info;
use webtraffic_by_country::{
    JobConfig, JobResult, KafkaRawSource, PartitionPolicy, Pipeline, ShardedPipeline, StdoutSink,
    DEFAULT_GROUP_ID,
};

#[derive(Parser)]
#[command(name = "webtraffic-by-country")]
#[command(about = "Counts web-traffic events per country over tumbling time windows")]
#[command(version)]
struct Cli {
    /// Kafka topic carrying raw web-traffic records
    #[arg(long)]
    topic: String,

    /// Kafka broker addresses, host:port,host:port
    #[arg(long)]
    brokers: String,

    /// Consumer group ID
    #[arg(long, default_value = DEFAULT_GROUP_ID)]
    group_id: String,

    /// Tumbling window length in seconds
    #[arg(long)]
    window_seconds: i64,

    /// Number of parallel window shards
    #[arg(long, default_value_t = 1)]
    shards: usize,

    /// Event partitioning across shards: by-key or round-robin
    #[arg(long, default_value = "by-key")]
    partitioning: PartitionPolicy,
}

#[tokio::main]
async fn main() -> JobResult<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = JobConfig {
        topic: cli.topic,
        brokers: cli.brokers,
        group_id: cli.group_id,
        window_seconds: cli.window_seconds,
        shards: cli.shards,
        partitioning: cli.partitioning,
    };
    config.log_parameters();
    let window_size = config.window_size()?;

    let mut source = KafkaRawSource::new(&config.kafka_source_config())?;
    let mut sink = StdoutSink::new();

    info!("job webtraffic-by-country is starting");
    if config.shards > 1 {
        let pipeline = ShardedPipeline::new(window_size, config.shards, config.partitioning)?;
        pipeline.run(&mut source, &mut sink).await
    } else {
        let mut pipeline = Pipeline::new(window_size)?;
        pipeline.run(&mut source, &mut sink).await
    }
}
