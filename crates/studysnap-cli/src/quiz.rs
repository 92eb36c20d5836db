//! Terminal quiz runner: drives a session from a still image to the final score.

use std::path::PathBuf;
use std::sync::Arc;

use dialoguer::Select;
use dialoguer::theme::ColorfulTheme;
use tracing::info;

use studysnap_core::config::Config;
use studysnap_media::{AudioOutput, CommandOutput, NarrationController, NarrationOutcome, SilentOutput};
use studysnap_providers::{CaptureConstraints, FileCaptureDevice, GeminiGateway};
use studysnap_session::{Phase, SessionController, SessionState};

const READ_ALOUD: &str = "Read aloud";

pub async fn run(
    config: &Config,
    image: PathBuf,
    count: Option<u8>,
    narration: bool,
) -> anyhow::Result<()> {
    let gateway = Arc::new(GeminiGateway::from_config(config));
    let output: Arc<dyn AudioOutput> = match config.player() {
        Some(argv) => Arc::new(CommandOutput::new(argv, config.spool_dir())),
        None => Arc::new(SilentOutput),
    };
    let narrator = NarrationController::new(gateway.clone(), output, config.sample_rate());
    let attempts = config
        .capture_attempts()
        .into_iter()
        .map(CaptureConstraints::from)
        .collect();

    let mut session = SessionController::new(
        gateway,
        Arc::new(FileCaptureDevice::new(image)),
        narrator,
    )
    .with_capture_attempts(attempts)
    .with_default_count(config.default_question_count());

    let narration = narration && config.narration_enabled();
    let result = take_quiz(&mut session, count, narration).await;
    session.reset();
    result
}

async fn take_quiz(
    session: &mut SessionController,
    count: Option<u8>,
    narration: bool,
) -> anyhow::Result<()> {
    session.start_capture()?;
    session.capture().await?;
    if let Some(n) = count {
        session.set_question_count(n)?;
    }

    if let Some(n) = session.view().question_count {
        println!("Analyzing image and generating {n} questions...");
    }
    session.confirm_generate().await?;

    if let SessionState::Failed { message, cause } = session.state() {
        eprintln!("{message}");
        anyhow::bail!("quiz generation failed: {cause}");
    }

    while session.phase() == Phase::Presenting {
        if !ask_current(session, narration).await? {
            println!("Quiz abandoned.");
            return Ok(());
        }
    }

    if let Some(result) = session.result() {
        info!(score = result.correct_answers, total = result.total_questions, "Quiz finished");
        println!();
        println!(
            "Quiz complete! You scored {}/{} ({}%).",
            result.correct_answers, result.total_questions, result.score_percentage
        );
    }
    Ok(())
}

/// Present the current question until it is answered and left.
/// Returns `false` when the user quits.
async fn ask_current(session: &mut SessionController, narration: bool) -> anyhow::Result<bool> {
    let view = session.view();
    let (Some(progress), Some(question)) = (view.progress, view.question) else {
        return Ok(false);
    };

    println!();
    println!("{} ({}%)", progress.label(), progress.percent);

    let mut items = question.options.clone();
    if narration {
        items.push(READ_ALOUD.to_string());
    }

    loop {
        let Some(choice) = select(question.prompt.clone(), items.clone()).await? else {
            return Ok(false);
        };
        if choice < question.options.len() {
            if let Some(feedback) = session.record_answer(choice)? {
                if feedback.is_correct {
                    println!("Correct!");
                } else {
                    println!(
                        "Incorrect. The answer was: {}",
                        question.options[feedback.correct_index]
                    );
                }
                if !feedback.explanation.is_empty() {
                    println!("{}", feedback.explanation);
                }
            }
            break;
        }
        read_aloud(session).await;
    }

    let next = if progress.position == progress.total {
        "Finish quiz"
    } else {
        "Next question"
    };
    let mut items = vec![next.to_string()];
    if narration {
        items.push(READ_ALOUD.to_string());
    }
    items.push("Quit".to_string());

    loop {
        match select(String::from("Continue"), items.clone()).await? {
            Some(0) => {
                session.advance()?;
                return Ok(true);
            }
            Some(1) if narration => read_aloud(session).await,
            _ => return Ok(false),
        }
    }
}

async fn read_aloud(session: &SessionController) {
    match session.toggle_narration().await {
        Some(NarrationOutcome::Unavailable) => println!("Narration is unavailable for this question."),
        Some(NarrationOutcome::Stopped) => println!("Narration stopped."),
        _ => {}
    }
}

/// Blocking terminal prompt, run off the async workers so playback keeps going.
async fn select(prompt: String, items: Vec<String>) -> anyhow::Result<Option<usize>> {
    let choice = tokio::task::spawn_blocking(move || {
        Select::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .items(&items)
            .default(0)
            .interact_opt()
    })
    .await??;
    Ok(choice)
}
