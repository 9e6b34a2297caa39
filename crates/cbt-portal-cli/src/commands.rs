use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use serde_json::Value;

use cbt_portal_core::auth::Session;
use cbt_portal_core::guard::LOGIN_PATH;
use cbt_portal_core::models::{ListParams, Role};
use cbt_portal_core::{ApiClient, AuthService, Config, GuardDecision, RouteGuard};

pub const USAGE: &str = "\
Usage: cbt-portal <command> [args]

Commands:
  login [identifier]        Sign in with email or matric number
  logout                    Sign out and forget stored tokens
  status                    Show the current session
  whoami                    Fetch your profile from the server
  refresh                   Refresh the access token now
  courses [--mine]          List courses (enrolled/coordinated with --mine)
  departments               List departments
  programs                  List programs
  get <path>                GET any API path and print the JSON
  can-visit <path>          Check whether the session may open a portal page
  forgot-password <email>   Request a password reset email
  reset-password <token>    Set a new password using a reset token
  verify-email <token>      Confirm an email address
  help                      Show this message

Environment: CBT_API_BASE_URL, CBT_API_VERSION, CBT_API_TIMEOUT_MS, CBT_DEBUG,
             CBT_SESSION_STORAGE (file|keyring|memory), CBT_DEDUPE_REFRESH, CBT_LOG_DIR";

/// Number of rows fetched by the list commands
const LIST_LIMIT: u64 = 50;

#[derive(Debug, PartialEq)]
pub enum Command {
    Login(Option<String>),
    Logout,
    Status,
    WhoAmI,
    Refresh,
    Courses { mine: bool },
    Departments,
    Programs,
    Get(String),
    CanVisit(String),
    ForgotPassword(String),
    ResetPassword(String),
    VerifyEmail(String),
    Help,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut iter = args.iter().map(String::as_str);
        let Some(name) = iter.next() else {
            return Ok(Command::Help);
        };
        let mut required = |what: &str| {
            iter.next()
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("`{}` requires {}", name, what))
        };

        Ok(match name {
            "login" => Command::Login(args.get(1).cloned()),
            "logout" => Command::Logout,
            "status" => Command::Status,
            "whoami" => Command::WhoAmI,
            "refresh" => Command::Refresh,
            "courses" => Command::Courses {
                mine: args.get(1).is_some_and(|a| a == "--mine"),
            },
            "departments" => Command::Departments,
            "programs" => Command::Programs,
            "get" => Command::Get(required("a path")?),
            "can-visit" => Command::CanVisit(required("a path")?),
            "forgot-password" => Command::ForgotPassword(required("an email address")?),
            "reset-password" => Command::ResetPassword(required("a reset token")?),
            "verify-email" => Command::VerifyEmail(required("a verification token")?),
            "help" | "--help" | "-h" => Command::Help,
            other => bail!("Unknown command: {}", other),
        })
    }
}

pub async fn dispatch(command: Command, client: &ApiClient, config: &mut Config) -> Result<()> {
    let auth = AuthService::new(client.clone());

    match command {
        Command::Login(identifier) => {
            let identifier = match identifier.or_else(|| config.last_identifier.clone()) {
                Some(id) => id,
                None => prompt("Email or matric number: ")?,
            };
            let password = rpassword::prompt_password(format!("Password for {}: ", identifier))
                .context("Failed to read password")?;

            let user = auth.login(&identifier, &password).await?;
            println!("Signed in as {} ({})", user.display_name(), user.role);

            config.last_identifier = Some(identifier);
            if let Err(e) = config.save() {
                tracing::warn!(error = %e, "Failed to save config");
            }
        }
        Command::Logout => {
            auth.logout().await;
            println!("Signed out");
        }
        Command::Status => print_status(&client.session().snapshot()),
        Command::WhoAmI => {
            let user = auth.fetch_profile().await?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Command::Refresh => {
            let pair = auth.refresh().await?;
            println!("Access token refreshed (expires in {}s)", pair.expires_in);
        }
        Command::Courses { mine } => {
            let params = ListParams::page(0, LIST_LIMIT);
            let courses = client.courses();
            let page = if mine {
                match client.session().snapshot().role() {
                    Some(Role::Lecturer) => courses.my_coordinated(&params).await?,
                    _ => courses.my_enrolled(&params).await?,
                }
            } else {
                courses.list(&params).await?
            };
            for course in &page.items {
                println!("{:<10} {:<40} {:>2} units  {}", course.code, course.name, course.credits, course.level);
            }
            print_total(page.items.len(), page.total);
        }
        Command::Departments => {
            let page = client.departments().list(&ListParams::page(0, LIST_LIMIT)).await?;
            for dept in &page.items {
                println!("{:<8} {:<40} HOD: {}", dept.code, dept.name, dept.hod_name);
            }
            print_total(page.items.len(), page.total);
        }
        Command::Programs => {
            let page = client.programs().list(&ListParams::page(0, LIST_LIMIT)).await?;
            for program in &page.items {
                println!("{:<8} {:<40} {}", program.code, program.name, program.department_name);
            }
            print_total(page.items.len(), page.total);
        }
        Command::Get(path) => {
            let value: Value = client.get(&path).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Command::CanVisit(path) => {
            let decision = RouteGuard::default().check(&path, &client.session().snapshot());
            match decision {
                GuardDecision::Allow => println!("allowed"),
                GuardDecision::RedirectToLogin => println!("redirect -> {}", LOGIN_PATH),
                GuardDecision::RedirectTo(target) => println!("redirect -> {}", target),
            }
        }
        Command::ForgotPassword(email) => {
            let ack = auth.forgot_password(&email).await?;
            println!("{}", ack.message);
        }
        Command::ResetPassword(token) => {
            let password = rpassword::prompt_password("New password: ")
                .context("Failed to read password")?;
            let ack = auth.reset_password(&token, &password).await?;
            println!("{}", ack.message);
        }
        Command::VerifyEmail(token) => {
            let ack = auth.verify_email(&token).await?;
            println!("{}", ack.message);
        }
        Command::Help => println!("{}", USAGE),
    }

    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let value = line.trim().to_string();
    if value.is_empty() {
        bail!("No identifier given");
    }
    Ok(value)
}

fn print_status(session: &Session) {
    if !session.is_authenticated {
        println!("Not signed in");
        return;
    }
    match session.user {
        Some(ref user) => println!("Signed in as {} <{}> ({})", user.display_name(), user.email, user.role),
        None => println!("Signed in (no profile loaded)"),
    }
    println!(
        "Refresh token: {}",
        if session.refresh_token().is_some() { "present" } else { "missing" }
    );
}

fn print_total(shown: usize, total: u64) {
    if total as usize > shown {
        println!("-- showing {} of {}", shown, total);
    }
}
