use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = tally_admin::Args::parse();
	tally_admin::run(args).await
}
