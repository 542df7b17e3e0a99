use kvlink_frame::opcode::GET;
use kvlink_frame::Request;

use crate::cmd::session::Session;
use crate::cmd::GetArgs;
use crate::exit::{CliError, CliResult, NOT_FOUND, SUCCESS, USAGE};
use crate::output::{print_frame, OutputFormat, ResponseContext};

pub fn run(args: GetArgs, format: OutputFormat) -> CliResult<i32> {
    if args.key.is_empty() {
        return Err(CliError::new(USAGE, "key must not be empty"));
    }
    let request = Request::new(GET)
        .with_key(args.key.clone().into_bytes())
        .with_vbucket(args.vbucket);

    let session = Session::open(&args.connect.addr, &args.connect.tls)?;
    let (frame, elapsed) = session.execute(&request)?;

    let connection = session.identity();
    let ctx = ResponseContext {
        connection: &connection,
        server: session.server(),
        elapsed,
    };
    print_frame(&frame, &ctx, format);

    Ok(if frame.is_success() { SUCCESS } else { NOT_FOUND })
}
