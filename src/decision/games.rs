use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static WORD_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9]+").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GameInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub genre: &'static str,
    #[serde(skip)]
    pub aliases: &'static [&'static str],
    pub context: &'static str,
}

pub const GAMES: &[GameInfo] = &[
    GameInfo {
        id: "valorant",
        name: "Valorant",
        genre: "tactical shooter",
        aliases: &[
            "valorant", "valo", "jett", "reyna", "phoenix", "sova", "omen", "raze",
            "killjoy", "cypher", "viper", "chamber", "radiant",
        ],
        context: "5v5 agent shooter; crosshair placement, utility timing and trading kills win rounds. Duelists entry, controllers smoke, sentinels hold flanks.",
    },
    GameInfo {
        id: "cs2",
        name: "Counter-Strike 2",
        genre: "tactical shooter",
        aliases: &[
            "cs2", "csgo", "cs go", "counter strike", "counterstrike", "mirage", "inferno",
            "dust2", "awp", "faceit",
        ],
        context: "Economy matters as much as aim. Learn smoke lineups for your map pool, don't force-buy every round, and counter-strafe before you shoot.",
    },
    GameInfo {
        id: "lol",
        name: "League of Legends",
        genre: "moba",
        aliases: &[
            "league of legends", "summoners rift", "jungler", "jungle", "baron",
            "drake", "adc", "midlane", "toplane",
        ],
        context: "Wave management and objective control climb faster than mechanics. Track the enemy jungler and ward before you push.",
    },
    GameInfo {
        id: "fortnite",
        name: "Fortnite",
        genre: "battle royale",
        aliases: &["fortnite", "zero build", "victory royale", "tilted towers"],
        context: "Land where you can loot fast, rotate early and keep mats for end game. Zero build rewards positioning over box fighting.",
    },
    GameInfo {
        id: "apex",
        name: "Apex Legends",
        genre: "battle royale",
        aliases: &[
            "apex", "apex legends", "wraith", "bloodhound", "pathfinder", "octane", "horizon",
            "predator rank",
        ],
        context: "Third parties decide most games. Fight with your squad, reset after every engagement and pick legends whose kits stack.",
    },
    GameInfo {
        id: "overwatch2",
        name: "Overwatch 2",
        genre: "hero shooter",
        aliases: &[
            "overwatch", "overwatch 2", "ow2", "tracer", "genji", "mercy", "reinhardt",
            "kiriko",
        ],
        context: "5v5 role queue; the tank sets the pace. Group up, track ultimates and swap heroes when a matchup is lost.",
    },
    GameInfo {
        id: "minecraft",
        name: "Minecraft",
        genre: "sandbox",
        aliases: &["minecraft", "creeper", "redstone", "nether", "ender dragon"],
        context: "Sandbox survival and building. Redstone farms, speedruns and big builds are the crowd pleasers.",
    },
    GameInfo {
        id: "elden_ring",
        name: "Elden Ring",
        genre: "action rpg",
        aliases: &["elden ring", "eldenring", "tarnished", "malenia", "radahn", "erdtree"],
        context: "Open world soulslike. Explore before forcing a boss, level vigor early and summon spirit ashes without shame.",
    },
    GameInfo {
        id: "cod",
        name: "Call of Duty",
        genre: "fps",
        aliases: &["call of duty", "cod", "warzone", "black ops", "modern warfare", "mw3"],
        context: "Fast time to kill; movement, headglitches and a meta loadout carry. Warzone is all about rotations and buy stations.",
    },
    GameInfo {
        id: "rocket_league",
        name: "Rocket League",
        genre: "sports",
        aliases: &["rocket league", "aerial", "flip reset", "ceiling shot"],
        context: "Car soccer. Rotation and boost management beat flashy mechanics until high ranks.",
    },
    GameInfo {
        id: "r6_siege",
        name: "Rainbow Six Siege",
        genre: "tactical shooter",
        aliases: &["rainbow six", "r6", "siege", "r6s", "thermite", "jager", "droning"],
        context: "Information wins rounds. Drone before you peek, reinforce the right walls and play around your hard breacher.",
    },
    GameInfo {
        id: "dota2",
        name: "Dota 2",
        genre: "moba",
        aliases: &["dota", "dota 2", "dota2", "roshan", "invoker", "pudge", "aegis"],
        context: "Farm priority, vision and smoke ganks. Last hitting and denying still decide the laning stage.",
    },
];

/// True when `keyword` appears as whole words in `text`. Multi-word keywords
/// must match a consecutive run of words.
pub fn contains_keyword(text: &str, keyword: &str) -> bool {
    let keyword_parts: Vec<&str> = WORD_SPLIT
        .split(keyword)
        .filter(|s| !s.is_empty())
        .collect();
    if keyword_parts.is_empty() {
        return false;
    }
    let words: Vec<&str> = WORD_SPLIT.split(text).filter(|s| !s.is_empty()).collect();

    words.windows(keyword_parts.len()).any(|window| {
        window
            .iter()
            .zip(keyword_parts.iter())
            .all(|(w, kw)| w.eq_ignore_ascii_case(kw))
    })
}

pub fn find_game(id: &str) -> Option<&'static GameInfo> {
    GAMES.iter().find(|g| g.id.eq_ignore_ascii_case(id))
}

/// Prefers the post's game tag when it names a known game, then alias matches in the text.
pub fn detect_game(text: &str, tag: Option<&str>) -> Option<&'static GameInfo> {
    if let Some(game) = tag.and_then(find_game) {
        return Some(game);
    }
    GAMES
        .iter()
        .find(|g| g.aliases.iter().any(|alias| contains_keyword(text, alias)))
}
