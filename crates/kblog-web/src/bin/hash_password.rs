//! Reads a password from stdin and prints its argon2 hash, for
//! `KBLOG_ADMIN_PASSWORD_HASH` or `[admin] password_hash`.

use std::io::{self, Write};

fn main() -> anyhow::Result<()> {
    eprint!("Enter password: ");
    io::stderr().flush()?;

    let mut password = String::new();
    io::stdin().read_line(&mut password)?;
    let password = password.trim();

    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }

    let hash = kblog_core::password::hash_password(password)?;
    println!("{hash}");
    Ok(())
}
