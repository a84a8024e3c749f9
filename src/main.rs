use camino::Utf8Path;
use eyre::{Result, WrapErr};
use tb_sim::{
    create_tb_model, create_tb_runtime, AddressConfig, BitbangServer, Harness, HarnessArgs,
    ModelTrace, Timing, ToggleCoverage, Transport, COVERAGE_FILE, JTAG_LOOPBACK_ONLY,
    JTAG_SERVER_PORT, TRACE_FILE,
};

fn main() -> Result<()> {
    env_logger::init();
    println!("\n🚀 tb-sim: Start of sim\n");

    let args = HarnessArgs::from_argv(std::env::args())?;
    let plusargs: Vec<&str> = args.plusargs().collect();
    if !plusargs.is_empty() {
        log::warn!(
            "plus-args are not forwarded to the model runtime: {}",
            plusargs.join(" ")
        );
    }
    let addresses = AddressConfig::resolve(&args)?;
    println!("{}", addresses);

    let transport = if args.jtag_enabled() {
        let server = BitbangServer::bind(JTAG_SERVER_PORT, JTAG_LOOPBACK_ONLY)
            .wrap_err("Could not initialize jtag_vpi server. Ending simulation.")?;
        Transport::active(server)
    } else {
        Transport::Disabled
    };

    let runtime = create_tb_runtime()?;
    let mut top = create_tb_model(&runtime, args.trace)?;
    let trace = args
        .trace
        .then(|| ModelTrace::open(&mut top, Utf8Path::new(TRACE_FILE)));

    let mut harness = Harness::new(top, Timing::default())?
        .with_addresses(&addresses)
        .with_transport(transport)
        .with_max_time(args.max_time());
    if let Some(trace) = trace {
        harness = harness.with_trace(Box::new(trace));
    }
    if args.coverage {
        harness = harness.with_coverage(Box::new(ToggleCoverage::new(COVERAGE_FILE)));
    }

    let report = harness.run();
    log::info!("{:?}", report);

    println!("\n🏁 tb-sim: End of sim");
    Ok(())
}
