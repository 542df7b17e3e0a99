use kvlink_frame::opcode::{status_name, VERSION};
use kvlink_frame::Request;

use crate::cmd::session::Session;
use crate::cmd::VersionArgs;
use crate::exit::{CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_frame, OutputFormat, ResponseContext};

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    if !args.extended {
        println!("kvlink {}", env!("CARGO_PKG_VERSION"));
    } else {
        println!("name: kvlink");
        println!("version: {}", env!("CARGO_PKG_VERSION"));
        println!("target: {}", option_env!("KVLINK_BUILD_TARGET").unwrap_or("unknown"));
        println!("profile: {}", option_env!("KVLINK_BUILD_PROFILE").unwrap_or("unknown"));
        println!("tls: rustls (ring provider)");
        println!("runtime: tokio multi-thread");
    }

    let Some(server) = args.server else {
        return Ok(SUCCESS);
    };

    let session = Session::open(&server, &args.tls)?;
    let (frame, elapsed) = session.execute(&Request::new(VERSION))?;
    if !frame.is_success() {
        return Err(CliError::new(
            FAILURE,
            format!("server refused VERSION: {}", status_name(frame.header().status)),
        ));
    }

    let connection = session.identity();
    let ctx = ResponseContext {
        connection: &connection,
        server: session.server(),
        elapsed,
    };
    print_frame(&frame, &ctx, format);
    Ok(SUCCESS)
}
