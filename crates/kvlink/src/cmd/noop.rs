use kvlink_frame::opcode::NOOP;
use kvlink_frame::Request;
use tracing::info;

use crate::cmd::session::Session;
use crate::cmd::NoopArgs;
use crate::exit::{CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_frame, OutputFormat, ResponseContext};

pub fn run(args: NoopArgs, format: OutputFormat) -> CliResult<i32> {
    if args.count == 0 {
        return Err(CliError::new(USAGE, "--count must be at least 1"));
    }

    let session = Session::open(&args.connect.addr, &args.connect.tls)?;
    let connection = session.identity();

    for opaque in 1..=args.count {
        let (frame, elapsed) = session.execute(&Request::new(NOOP).with_opaque(opaque))?;
        if frame.header().opaque != opaque {
            return Err(CliError::new(
                DATA_INVALID,
                format!(
                    "response opaque {} does not match request {opaque}",
                    frame.header().opaque
                ),
            ));
        }

        let ctx = ResponseContext {
            connection: &connection,
            server: session.server(),
            elapsed,
        };
        print_frame(&frame, &ctx, format);
    }

    info!(count = args.count, server = session.server(), "noop complete");
    Ok(SUCCESS)
}
