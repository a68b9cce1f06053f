use clap::CommandFactory;

use super::*;

fn remember_me_help(subcommand: &str) -> String {
    let cli = Cli::command();
    let sub = cli.find_subcommand(subcommand).unwrap();
    let arg = sub.get_arguments().find(|a| a.get_id() == "remember_me").unwrap();
    arg.get_help().unwrap().to_string()
}

#[test]
fn cli_definition_is_valid() {
    Cli::command().debug_assert();
}

#[test]
fn remember_me_help_explains_transient_sessions() {
    for subcommand in ["login", "admin-login"] {
        let help = remember_me_help(subcommand);
        assert!(help.contains("storage file"), "{subcommand}: {help}");
        assert!(help.contains("only for this process"), "{subcommand}: {help}");
    }
}

#[test]
fn login_defaults_to_transient_session() {
    let cli = Cli::try_parse_from(["portal-auth", "login", "0712345678", "--password", "pw"]).unwrap();
    assert!(matches!(cli.command, Command::Login { remember_me: false, .. }));

    let cli = Cli::try_parse_from(["portal-auth", "login", "0712345678", "--password", "pw", "--remember-me"]).unwrap();
    assert!(matches!(cli.command, Command::Login { remember_me: true, .. }));
}
