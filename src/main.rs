use borelayout::settings::{self};
use borelayout::sweep::Sweep;

fn main() -> anyhow::Result<()> {
    borelayout::init_logging()?;

    let settings = settings::load_config()?;
    tracing::info!("{}", settings);
    let mut sweep = Sweep::new(settings)?;

    sweep.solve()?;
    sweep.writeup()
}
