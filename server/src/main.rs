use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
	match gatehouse::run().await {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			eprintln!("gatehouse: {}", err);
			ExitCode::FAILURE
		}
	}
}

// vim: ts=4
