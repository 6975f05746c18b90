//! Drive a login prompt the way an unattended install script would.
//!
//! A small shell script stands in for the VM's serial console so the demo
//! runs anywhere with `/bin/sh`:
//!
//! ```sh
//! cargo run -p vmkit --example scripted_login
//! RUST_LOG=vmkit=debug cargo run -p vmkit --example scripted_login
//! ```

use std::time::Duration;

use vmkit::prelude::*;
use vmkit::{EnvConfig, logging};

const GUEST: &str = r#"
echo 'SeaBIOS (version 1.16.2)'
echo 'Booting from Hard Disk...'
sleep 0.2
printf 'debian login: '
read user
printf 'Password: '
read pass
echo "Linux debian 6.1.0-amd64 x86_64"
printf 'root@debian:~# '
while read cmd; do
  case "$cmd" in
    poweroff) echo 'reboot: Power down'; exit 0 ;;
    *) echo "$cmd: ok"; printf 'root@debian:~# ' ;;
  esac
done
"#;

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = ConsoleConfig::new("/bin/sh").args(["-c", GUEST]);
    config.apply_env(&EnvConfig::default())?;
    logging::init(&config.logging)?;

    let console = Console::launch(config)?;

    // Answer the login prompt from the reader task, the way a preseed
    // script types credentials as soon as the prompt shows up.
    let input = console.input_handle()?;
    console.expect("login: ", move |m| {
        tracing::info!(offset = m.offset, "login prompt");
        let _ = input.queue(b"root\n".to_vec());
    });
    let password = console.wait_for("Password: ");

    console
        .with_deadline(Duration::from_secs(30), async {
            password.await?;
            let shell = console.wait_for("# ");
            console.send_line("insecure").await?;
            shell.await?;

            let echoed = console.wait_for_regex(r"(\w+): ok")?;
            console.send_line("uptime").await?;
            let m = echoed.await?;
            tracing::info!(command = %String::from_utf8_lossy(m.group(1).unwrap_or_default()), "command ran");

            let down = console.wait_for("Power down");
            console.send_line("poweroff").await?;
            down.await?;
            Ok::<_, VmkitError>(())
        })
        .await?;

    let status = console.wait().await?;
    println!("guest exited with {status}");
    Ok(())
}
