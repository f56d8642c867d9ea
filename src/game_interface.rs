//! What an agent must provide to take part in a tournament.
//!
//! Agents come in two flavours:
//! - in-process agents implement [`MovePolicy`] and run on a worker thread for each move,
//! - process agents are executables speaking the line protocol below. Agent authors can
//!   implement [`MovePolicy`] and hand it to [`run_remote_agent`] in their `main`.
//!
//! # Process agent protocol
//!
//! The agent is launched as `<exe> <port> <budget-micros> <side> [configured args...]` and must
//! connect to `127.0.0.1:<port>` right away. Then, for each of its turns:
//!  * Server -> Agent: `"<capability> <board>\n"` (see [`Capability`] and [`Board`])
//!  * Agent -> Server: `"<column>\n"`
//!
//! The agent is killed when the match ends or when it exceeds the per-move budget.

use std::{
    fmt,
    io::{BufRead, BufReader, Write},
    net::{Ipv4Addr, SocketAddrV4, TcpStream},
    str::FromStr,
    time::Duration,
};

use anyhow::{bail, Context};

use crate::board::{Board, Side};

/// Declared type of an agent, used to pick the opponent's [`Capability`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AgentKind {
    /// A searching agent.
    #[default]
    Ai,
    /// An agent that plays random legal moves.
    Random,
}

impl FromStr for AgentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ai" => Ok(AgentKind::Ai),
            "random" => Ok(AgentKind::Random),
            other => bail!("unknown agent kind '{other}' (expected 'ai' or 'random')"),
        }
    }
}

/// Which move-selection variant the agent is asked to use for this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// The opponent declared itself [`AgentKind::Random`].
    VersusRandom,
    /// Any other opponent.
    General,
}

impl Capability {
    /// Capability to request from an agent facing an opponent of kind `opponent`.
    pub fn against(opponent: AgentKind) -> Self {
        match opponent {
            AgentKind::Random => Capability::VersusRandom,
            AgentKind::Ai => Capability::General,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::VersusRandom => f.write_str("versus-random"),
            Capability::General => f.write_str("general"),
        }
    }
}

impl FromStr for Capability {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "versus-random" => Ok(Capability::VersusRandom),
            "general" => Ok(Capability::General),
            other => bail!("unknown capability '{other}'"),
        }
    }
}

/// Move selection of an in-process agent.
///
/// Called on a fresh worker thread for every turn; a call that does not return within the
/// budget is abandoned and its result discarded. Panicking forfeits the match.
pub trait MovePolicy: Send + Sync {
    /// Column to play for `side` on `board`.
    fn select_move(&self, board: &Board, side: Side, capability: Capability) -> usize;
}

impl<F> MovePolicy for F
where
    F: Fn(&Board, Side, Capability) -> usize + Send + Sync,
{
    fn select_move(&self, board: &Board, side: Side, capability: Capability) -> usize {
        self(board, side, capability)
    }
}

/// Parameters given to a process agent on its command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchArgs {
    /// Loopback port to connect to.
    pub port: u16,
    /// Wall-clock budget of each move.
    pub budget: Duration,
    /// Side played in this match.
    pub side: Side,
}

impl LaunchArgs {
    /// Arguments in the order expected by agents.
    pub fn to_args(&self) -> Vec<String> {
        vec![
            self.port.to_string(),
            self.budget.as_micros().to_string(),
            self.side.number().to_string(),
        ]
    }

    /// Parse the first three arguments after the binary name.
    pub fn parse(mut args: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        let port = args.next().context("missing port")?.parse()?;
        let micros: u64 = args.next().context("missing budget")?.parse()?;
        let side = match args.next().context("missing side")?.as_str() {
            "1" => Side::One,
            "2" => Side::Two,
            other => bail!("invalid side '{other}'"),
        };
        Ok(LaunchArgs {
            port,
            budget: Duration::from_micros(micros),
            side,
        })
    }
}

/// Split a turn request into capability and board.
pub fn parse_request(line: &str) -> anyhow::Result<(Capability, Board)> {
    let (capability, board) = line
        .trim()
        .split_once(' ')
        .context("request must be '<capability> <board>'")?;
    Ok((capability.parse()?, board.parse()?))
}

/// Agent side of the process protocol: connect back to the server and answer every turn with
/// `policy` until the server closes the connection.
///
/// Reads the launch arguments from `std::env::args()`.
pub fn run_remote_agent<P: MovePolicy>(policy: P) -> anyhow::Result<()> {
    let launch = LaunchArgs::parse(std::env::args().skip(1))?;
    let addr = SocketAddrV4::new(Ipv4Addr::LOCALHOST, launch.port);
    let mut stream = TcpStream::connect(addr).context("could not connect to server")?;
    let mut reader = BufReader::new(stream.try_clone()?);

    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            // server hung up: match over
            return Ok(());
        }
        let (capability, board) = parse_request(&line)?;
        let column = policy.select_move(&board, launch.side, capability);
        stream.write_all(format!("{column}\n").as_bytes())?;
    }
}

#[cfg(test)]
mod interface_tests {
    use super::*;

    #[test]
    fn capability_follows_opponent_kind() {
        assert_eq!(Capability::against(AgentKind::Random), Capability::VersusRandom);
        assert_eq!(Capability::against(AgentKind::Ai), Capability::General);
    }

    #[test]
    fn request_round_trip() {
        let mut board = Board::new();
        board.apply_move(2, Side::One).unwrap();
        let line = format!("{} {board}\n", Capability::VersusRandom);
        let (capability, parsed) = parse_request(&line).unwrap();
        assert_eq!(capability, Capability::VersusRandom);
        assert_eq!(parsed, board);
        assert!(parse_request("general").is_err());
    }

    #[test]
    fn launch_args() {
        let launch = LaunchArgs {
            port: 4242,
            budget: Duration::from_millis(250),
            side: Side::Two,
        };
        let args = launch.to_args();
        assert_eq!(args, vec!["4242", "250000", "2"]);
        assert_eq!(LaunchArgs::parse(args.into_iter()).unwrap(), launch);
        assert!(LaunchArgs::parse(vec!["1".to_string()].into_iter()).is_err());
    }

    #[test]
    fn closures_are_policies() {
        fn column_of<P: MovePolicy>(policy: &P) -> usize {
            policy.select_move(&Board::new(), Side::One, Capability::General)
        }
        assert_eq!(column_of(&|_: &Board, _: Side, _: Capability| 3), 3);
    }

    #[test]
    fn agent_kind_parsing() {
        assert_eq!("random".parse::<AgentKind>().unwrap(), AgentKind::Random);
        assert_eq!(" ai ".parse::<AgentKind>().unwrap(), AgentKind::Ai);
        assert!("human".parse::<AgentKind>().is_err());
    }
}
