use carlbot::db::{self, Post};
use carlbot::decision::{games, DecisionContext, DecisionGate, InteractionType};
use carlbot::llm::OpenAiClient;
use carlbot::settings::settings;
use carlbot::utils::{dim, print_decision};
use std::env;
use std::process;
use std::str::FromStr;
use std::sync::Arc;

fn print_usage() {
    eprintln!("Usage: decide-post <text> [--type like|comment|retweet] [--game <id>]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <text>     Post text to run through the decision gate");
    eprintln!("  --type     Interaction to decide on (default: comment)");
    eprintln!("  --game     Game tag for the post, e.g. valorant");
}

struct Args {
    text: String,
    kind: InteractionType,
    game_id: Option<String>,
}

fn parse_args(raw: &[String]) -> Result<Args, String> {
    let mut words = Vec::new();
    let mut kind = InteractionType::Comment;
    let mut game_id = None;

    let mut iter = raw.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--type" | "-t" => {
                let value = iter.next().ok_or("--type needs a value")?;
                kind = InteractionType::from_str(value)
                    .map_err(|_| format!("unknown interaction type '{value}'"))?;
            }
            "--game" | "-g" => {
                let value = iter.next().ok_or("--game needs a value")?;
                if games::find_game(value).is_none() {
                    return Err(format!("unknown game '{value}'"));
                }
                game_id = Some(value.clone());
            }
            _ => words.push(arg.as_str()),
        }
    }

    if words.is_empty() {
        return Err("missing post text".into());
    }

    Ok(Args {
        text: words.join(" "),
        kind,
        game_id,
    })
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let raw: Vec<String> = env::args().skip(1).collect();
    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    let s = settings();
    let client = match OpenAiClient::new(&s.llm) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("could not build model client: {e}");
            process::exit(1);
        }
    };
    if !client.is_configured() {
        println!("{}", dim().apply_to("no LLM_API_KEY set, the model call will fail"));
    }

    let post = Post {
        id: 0,
        user_id: 0,
        content: args.text.clone(),
        game_id: args.game_id,
        community_id: None,
        likes_count: 0,
        comments_count: 0,
        retweets_count: 0,
        shares_count: 0,
        is_public: true,
        is_deleted: false,
        deleted_reason: None,
        created_at: db::now(),
        edited_at: None,
    };
    let ctx = DecisionContext {
        author: "cli".into(),
        ..Default::default()
    };

    let gate = DecisionGate::new(Arc::new(client));
    let decision = gate.decide_with_context(&post, args.kind, &ctx, &s).await;
    print_decision(&args.text, args.kind, &decision);
}
