use ai_knockout::game_interface::run_remote_agent;
use ai_knockout::policies::FirstLegalColumn;

fn main() -> ai_knockout::anyhow::Result<()> {
    run_remote_agent(FirstLegalColumn)
}
