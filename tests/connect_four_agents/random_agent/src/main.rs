use ai_knockout::game_interface::run_remote_agent;
use ai_knockout::policies::RandomMover;

fn main() -> ai_knockout::anyhow::Result<()> {
    let seed = std::env::args()
        .nth(1)
        .and_then(|port| port.parse().ok())
        .unwrap_or(0);
    run_remote_agent(RandomMover::new(seed))
}
