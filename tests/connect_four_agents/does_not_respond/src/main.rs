use std::{
    net::{Ipv4Addr, SocketAddrV4, TcpStream},
    thread,
    time::Duration,
};

use ai_knockout::game_interface::LaunchArgs;

fn main() -> ai_knockout::anyhow::Result<()> {
    let launch = LaunchArgs::parse(std::env::args().skip(1))?;
    let _stream = TcpStream::connect(SocketAddrV4::new(Ipv4Addr::LOCALHOST, launch.port))?;
    loop {
        thread::sleep(Duration::from_secs(60));
    }
}
