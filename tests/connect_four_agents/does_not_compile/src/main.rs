use ai_knockout::game_interface::run_remote_agent;

fn main() -> ai_knockout::anyhow::Result<()> {
    let column: usize = "three";
    run_remote_agent(move |_: &_, _, _| column)
}
