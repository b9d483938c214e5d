use grpc_interceptors::{
    ContextError, InterceptorConfig, LogFormat, Result, classify,
    logging,
};

fn main() -> Result<()> {
    let config = InterceptorConfig::builder()
        .log_filter("debug")
        .log_format(LogFormat::Text)
        .build();
    logging::init(&config)?;

    let failures: Vec<anyhow::Error> = vec![
        anyhow::Error::new(ContextError::Canceled)
            .context("load passenger")
            .context("reserve seat"),
        anyhow::anyhow!("pq: invalid input syntax for type uuid: \"xyz\""),
        anyhow::anyhow!("economy class is sold out for flight 42"),
        anyhow::anyhow!("driver: bad connection").context("begin transaction"),
        tonic::Status::failed_precondition("fare changed").into(),
        anyhow::anyhow!("unexpected nil pointer at line 88"),
    ];

    for err in &failures {
        let classified = classify(err);
        println!(
            "{:<24} {:<40} <- {err:#}",
            format!("{:?}", classified.code()),
            classified.message(),
        );
    }

    Ok(())
}
