//! Playwright-driven login agent
//!
//! Generates a Node.js script per login attempt, runs it, and reads back a
//! single JSON report line from stdout. Credentials and the saved browser
//! snapshot are handed over through environment variables and a temp file,
//! never embedded in the script text.

use async_trait::async_trait;
use jasper_common::{BrowserCookie, Error, LoginConfig, Result};
use serde::Deserialize;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::agent::{LoginAgent, LoginOutcome, LoginRequest};

const ENV_LOGIN_ID: &str = "JASPER_LOGIN_ID";
const ENV_LOGIN_PW: &str = "JASPER_LOGIN_PW";
const ENV_SNAPSHOT: &str = "JASPER_LOGIN_SNAPSHOT";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn parse(name: &str) -> Self {
        match name {
            "firefox" => Browser::Firefox,
            "webkit" => Browser::Webkit,
            _ => Browser::Chromium,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

/// Report printed by the generated script.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ScriptReport {
    Authenticated {
        cookies: Vec<BrowserCookie>,
        #[serde(default)]
        reused_snapshot: bool,
    },
    ManualInterventionRequired,
    Failed {
        error: String,
    },
}

impl From<ScriptReport> for LoginOutcome {
    fn from(report: ScriptReport) -> Self {
        match report {
            ScriptReport::Authenticated {
                cookies,
                reused_snapshot,
            } => LoginOutcome::Authenticated {
                cookies,
                reused_snapshot,
            },
            ScriptReport::ManualInterventionRequired => LoginOutcome::ManualInterventionRequired,
            ScriptReport::Failed { error } => LoginOutcome::Failed(error),
        }
    }
}

/// Login agent backed by Playwright running under Node.js
pub struct PlaywrightLoginAgent {
    config: LoginConfig,
    browser: Browser,
}

impl PlaywrightLoginAgent {
    pub fn new(config: LoginConfig) -> Self {
        let browser = Browser::parse(&config.browser);
        Self { config, browser }
    }

    /// Build the login script for one request
    pub fn build_script(&self, request: &LoginRequest) -> String {
        let layout = &request.layout;
        let cfg = &self.config;

        let mut script = format!(
            r#"
const playwright = require('playwright');
const fs = require('fs');

function emit(report) {{
  console.log(JSON.stringify(report));
}}

function toPlaywrightCookie(c) {{
  const cookie = {{ name: c.name, value: c.value }};
  if (c.domain) {{
    cookie.domain = c.domain;
    cookie.path = c.path || '/';
  }} else {{
    cookie.url = loginUrl;
  }}
  const expires = c.expiry !== undefined ? c.expiry : c.expires;
  if (typeof expires === 'number') cookie.expires = expires;
  if (typeof c.httpOnly === 'boolean') cookie.httpOnly = c.httpOnly;
  if (typeof c.secure === 'boolean') cookie.secure = c.secure;
  if (['Strict', 'Lax', 'None'].includes(c.sameSite)) cookie.sameSite = c.sameSite;
  return cookie;
}}

const loginUrl = {login_url};
const homeUrl = {home_url};
const usernameXpath = {username_xpath};
const passwordXpath = {password_xpath};
const submitXpath = {submit_xpath};
const successMarker = {success_marker};
const loginMarker = {login_marker};
const challengeTitle = {challenge_title};
const fieldWaitMs = {field_wait_ms};
const landingWaitMs = {landing_wait_ms};
const maxChallengeWaits = {max_challenge_waits};

(async () => {{
  const browser = await playwright.{browser}.launch({{
    headless: {headless},
    args: ['--no-sandbox', '--disable-dev-shm-usage'],
  }});
  const context = await browser.newContext();
  const page = await context.newPage();

  try {{
    await page.goto(loginUrl);
"#,
            login_url = js_str(&layout.urls.login),
            home_url = js_str(&layout.urls.home),
            username_xpath = js_str(&layout.element_xpath.input_box.login_username),
            password_xpath = js_str(&layout.element_xpath.input_box.login_password),
            submit_xpath = js_str(&layout.element_xpath.button.login_submit),
            success_marker = js_str(&cfg.success_title_marker),
            login_marker = js_str(&cfg.login_title_marker),
            challenge_title = js_str(&cfg.challenge_title),
            field_wait_ms = cfg.field_wait().as_millis(),
            landing_wait_ms = cfg.landing_wait().as_millis(),
            max_challenge_waits = cfg.max_challenge_waits,
            browser = self.browser.as_str(),
            headless = cfg.headless,
        );

        // Silent reuse of the saved snapshot
        script.push_str(&format!(
            r#"
    const snapshotPath = process.env.{env_snapshot};
    if (snapshotPath) {{
      const snapshot = JSON.parse(fs.readFileSync(snapshotPath, 'utf8'));
      await context.clearCookies();
      await context.addCookies(snapshot.map(toPlaywrightCookie));
      await page.goto(loginUrl);
      if ((await page.title()).includes(successMarker)) {{
        emit({{ status: 'authenticated', reused_snapshot: true, cookies: await context.cookies() }});
        return;
      }}
    }}
"#,
            env_snapshot = ENV_SNAPSHOT,
        ));

        // Credential submission
        script.push_str(&format!(
            r#"
    const username = await page.waitForSelector('xpath=' + usernameXpath, {{ timeout: fieldWaitMs }});
    await username.fill(process.env.{env_id} || '');
    const password = await page.waitForSelector('xpath=' + passwordXpath, {{ timeout: fieldWaitMs }});
    await password.fill(process.env.{env_pw} || '');
    const submit = await page.waitForSelector('xpath=' + submitXpath, {{ timeout: fieldWaitMs }});
    await submit.click();
"#,
            env_id = ENV_LOGIN_ID,
            env_pw = ENV_LOGIN_PW,
        ));

        // Landing page, tolerating a bounded number of challenge waits
        script.push_str(
            r#"
    for (let wait = 0; wait <= maxChallengeWaits; wait++) {
      try {
        await page.waitForFunction(
          (marker) => document.title.includes(marker),
          successMarker,
          { timeout: landingWaitMs },
        );
        emit({ status: 'authenticated', reused_snapshot: false, cookies: await context.cookies() });
        return;
      } catch (error) {
        if (!(error instanceof playwright.errors.TimeoutError)) throw error;
        const title = await page.title();
        if (title === challengeTitle || title.includes(loginMarker)) {
          console.error('waiting on page: ' + title);
          continue;
        }
        emit({ status: 'failed', error: 'unexpected page after login: ' + title + ' (expected ' + homeUrl + ')' });
        return;
      }
    }
    emit({ status: 'manual_intervention_required' });
  } catch (error) {
    emit({ status: 'failed', error: error.message });
  } finally {
    await browser.close();
  }
})();
"#,
        );

        script
    }

    async fn run_script(&self, script: &str, request: &LoginRequest) -> Result<LoginOutcome> {
        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("login.js");
        std::fs::write(&script_path, script)?;

        let mut cmd = Command::new(&self.config.node_binary);
        cmd.arg(&script_path)
            .current_dir(temp_dir.path())
            .env(ENV_LOGIN_ID, &request.credentials.id)
            .env(ENV_LOGIN_PW, &request.credentials.password)
            .kill_on_drop(true);

        if let Some(node_path) = &self.config.node_path {
            cmd.env("NODE_PATH", node_path);
        }

        match &request.snapshot {
            Some(snapshot) if !snapshot.is_empty() => {
                let snapshot_path = temp_dir.path().join("snapshot.json");
                write_snapshot(&snapshot_path, snapshot)?;
                cmd.env(ENV_SNAPSHOT, &snapshot_path);
                debug!("Offering {} saved browser cookies for reuse", snapshot.len());
            }
            _ => {
                cmd.env_remove(ENV_SNAPSHOT);
            }
        }

        debug!("Running login script: {}", script_path.display());

        let deadline = self.config.overall_deadline();
        let output = tokio::time::timeout(deadline, cmd.output())
            .await
            .map_err(|_| Error::Timeout {
                seconds: deadline.as_secs(),
            })?
            .map_err(|e| {
                Error::Agent(format!("failed to run {}: {}", self.config.node_binary, e))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!("Login script stderr: {}", stderr.trim());
        }

        match parse_report(&stdout) {
            Some(outcome) => Ok(outcome),
            None => Err(Error::Agent(format!(
                "login script produced no report (exit: {}): {}",
                output.status,
                stderr.trim()
            ))),
        }
    }
}

#[async_trait]
impl LoginAgent for PlaywrightLoginAgent {
    async fn login(&self, request: &LoginRequest) -> Result<LoginOutcome> {
        info!("Starting browser login for {}", request.project);
        let script = self.build_script(request);
        let outcome = self.run_script(&script, request).await?;

        match &outcome {
            LoginOutcome::Authenticated {
                cookies,
                reused_snapshot,
            } => info!(
                "Browser login for {} succeeded ({} cookies, reused snapshot: {})",
                request.project,
                cookies.len(),
                reused_snapshot
            ),
            LoginOutcome::ManualInterventionRequired => warn!(
                "Browser login for {} is stuck on the verification page",
                request.project
            ),
            LoginOutcome::Failed(reason) => {
                warn!("Browser login for {} failed: {}", request.project, reason)
            }
        }
        Ok(outcome)
    }
}

/// Last stdout line that parses as a report wins.
fn parse_report(stdout: &str) -> Option<LoginOutcome> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .find_map(|line| serde_json::from_str::<ScriptReport>(line).ok())
        .map(LoginOutcome::from)
}

fn write_snapshot(path: &Path, snapshot: &[BrowserCookie]) -> Result<()> {
    let content = serde_json::to_string(snapshot)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Quote a value as a JavaScript string literal.
fn js_str(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "''".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jasper_common::{
        ButtonLocators, Credentials, ElementLocators, InputBoxLocators, PortalLayout, PortalUrls,
    };

    fn request(snapshot: Option<Vec<BrowserCookie>>) -> LoginRequest {
        LoginRequest {
            project: "GP".to_string(),
            credentials: Credentials {
                id: "gp-operator".to_string(),
                password: "s3cr3t-pw".to_string(),
            },
            layout: PortalLayout {
                urls: PortalUrls {
                    login: "https://cc.example.com/provision/jsp/login.jsp".to_string(),
                    home: "https://cc.example.com/provision/ui/home".to_string(),
                },
                element_xpath: ElementLocators {
                    input_box: InputBoxLocators {
                        login_username: "//*[@id=\"j_username\"]".to_string(),
                        login_password: "//*[@id=\"j_password\"]".to_string(),
                        search_sim: None,
                    },
                    button: ButtonLocators {
                        login_submit: "//button[@type='submit']".to_string(),
                    },
                },
            },
            snapshot,
        }
    }

    #[test]
    fn test_script_embeds_layout_and_bounds() {
        let config = LoginConfig {
            headless: true,
            max_challenge_waits: 4,
            ..Default::default()
        };
        let agent = PlaywrightLoginAgent::new(config);
        let script = agent.build_script(&request(None));

        assert!(script.contains(r#"const loginUrl = "https://cc.example.com/provision/jsp/login.jsp";"#));
        assert!(script.contains(r#"const usernameXpath = "//*[@id=\"j_username\"]";"#));
        assert!(script.contains(r#"const submitXpath = "//button[@type='submit']";"#));
        assert!(script.contains("const fieldWaitMs = 10000;"));
        assert!(script.contains("const landingWaitMs = 30000;"));
        assert!(script.contains("const maxChallengeWaits = 4;"));
        assert!(script.contains("const successMarker = \"欢迎\";"));
        assert!(script.contains("playwright.chromium.launch"));
        assert!(script.contains("headless: true"));
    }

    #[test]
    fn test_script_never_contains_credentials() {
        let agent = PlaywrightLoginAgent::new(LoginConfig::default());
        let script = agent.build_script(&request(Some(vec![BrowserCookie::new("JSESSIONID", "cookie-value")])));

        assert!(!script.contains("s3cr3t-pw"));
        assert!(!script.contains("gp-operator"));
        assert!(!script.contains("cookie-value"));
        assert!(script.contains("process.env.JASPER_LOGIN_PW"));
    }

    #[test]
    fn test_browser_parse() {
        assert_eq!(Browser::parse("firefox"), Browser::Firefox);
        assert_eq!(Browser::parse("webkit"), Browser::Webkit);
        assert_eq!(Browser::parse("edge"), Browser::Chromium);
    }

    #[test]
    fn test_parse_report_outcomes() {
        let stdout = "noise\n{\"status\":\"authenticated\",\"reused_snapshot\":true,\"cookies\":[{\"name\":\"JSESSIONID\",\"value\":\"abc\",\"expires\":-1}]}\n";
        match parse_report(stdout) {
            Some(LoginOutcome::Authenticated { cookies, reused_snapshot }) => {
                assert!(reused_snapshot);
                assert_eq!(cookies.len(), 1);
                assert_eq!(cookies[0].name, "JSESSIONID");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        assert_eq!(
            parse_report("{\"status\":\"manual_intervention_required\"}"),
            Some(LoginOutcome::ManualInterventionRequired)
        );
        assert_eq!(
            parse_report("{\"status\":\"failed\",\"error\":\"Timeout 10000ms exceeded\"}\n\n"),
            Some(LoginOutcome::Failed("Timeout 10000ms exceeded".to_string()))
        );
        assert_eq!(parse_report("Error: Cannot find module 'playwright'"), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_login_runs_node_with_credentials_in_env() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::TempDir::new().unwrap();
        let fake_node = tmp.path().join("fake-node");
        std::fs::write(
            &fake_node,
            "#!/bin/sh\n\
             echo \"{\\\"status\\\":\\\"authenticated\\\",\\\"cookies\\\":[{\\\"name\\\":\\\"user\\\",\\\"value\\\":\\\"$JASPER_LOGIN_ID\\\"},{\\\"name\\\":\\\"snap\\\",\\\"value\\\":\\\"${JASPER_LOGIN_SNAPSHOT:+yes}\\\"}]}\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&fake_node, std::fs::Permissions::from_mode(0o755)).unwrap();

        let agent = PlaywrightLoginAgent::new(LoginConfig {
            node_binary: fake_node.to_string_lossy().to_string(),
            ..Default::default()
        });

        let outcome = agent
            .login(&request(Some(vec![BrowserCookie::new("JSESSIONID", "old")])))
            .await
            .unwrap();
        match outcome {
            LoginOutcome::Authenticated { cookies, reused_snapshot } => {
                assert!(!reused_snapshot);
                assert_eq!(cookies[0].value, "gp-operator");
                assert_eq!(cookies[1].value, "yes");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_node_binary_is_agent_error() {
        let agent = PlaywrightLoginAgent::new(LoginConfig {
            node_binary: "/nonexistent/node-binary".to_string(),
            ..Default::default()
        });
        let err = agent.login(&request(None)).await.unwrap_err();
        assert!(matches!(err, Error::Agent(_)));
        assert!(err.is_login_failure());
    }
}
