use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

pub const API_BASE_ENV_VAR: &str =
  "CLEAR_API_BASE_URL";
const CLEARRC_ENV_VAR: &str = "CLEARRC";
const DEFAULT_API_BASE_PATH: &str =
  "/api";
pub const DEFAULT_PAGE_SIZE: usize = 3;

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    for (k, v) in [
      ("server.url", "http://localhost:8080"),
      ("api.base_path", DEFAULT_API_BASE_PATH),
      ("data.location", "~/.clear"),
      ("tasks.page_size", "3"),
      ("notify.duration_ms", "1200"),
      ("http.timeout_secs", "30"),
      ("color", "on")
    ] {
      map.insert(k.to_string(), v.to_string());
    }
    Config {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    clearrc_override
  ))]
  pub fn load(
    clearrc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let clearrc = resolve_clearrc_path(
      clearrc_override
    )?;
    if let Some(path) = clearrc {
      info!(clearrc = %path.display(), "loading clearrc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no clearrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    self
      .map
      .get(key)
      .map(|v| {
        parse_bool(v).ok_or_else(|| {
          anyhow!(
            "config key {key} must be on \
             or off, got {v}"
          )
        })
      })
      .transpose()
  }

  pub fn get_u64(
    &self,
    key: &str
  ) -> anyhow::Result<Option<u64>> {
    self
      .map
      .get(key)
      .map(|v| {
        v.trim().parse::<u64>().with_context(
          || {
            format!(
              "config key {key} must be \
               a non-negative integer, \
               got {v}"
            )
          }
        )
      })
      .transpose()
  }

  /// Root URL every endpoint path is
  /// appended to.
  ///
  /// `CLEAR_API_BASE_URL` wins over the
  /// config file; an absolute URL replaces
  /// `server.url`, a bare path is appended
  /// to it.
  pub fn api_base_url(&self) -> String {
    let env_base =
      std::env::var(API_BASE_ENV_VAR)
        .ok()
        .filter(|v| !v.trim().is_empty());
    self.api_base_url_with(
      env_base.as_deref()
    )
  }

  fn api_base_url_with(
    &self,
    env_base: Option<&str>
  ) -> String {
    let base_path = env_base
      .map(str::to_string)
      .or_else(|| self.get("api.base_path"))
      .unwrap_or_else(|| {
        DEFAULT_API_BASE_PATH.to_string()
      });
    let base_path = base_path.trim();

    if base_path.starts_with("http://")
      || base_path.starts_with("https://")
    {
      return base_path
        .trim_end_matches('/')
        .to_string();
    }

    let server = self
      .get("server.url")
      .unwrap_or_default();
    format!(
      "{}/{}",
      server.trim_end_matches('/'),
      base_path.trim_matches('/')
    )
    .trim_end_matches('/')
    .to_string()
  }

  pub fn page_size(
    &self
  ) -> anyhow::Result<usize> {
    let size = self
      .get_u64("tasks.page_size")?
      .unwrap_or(DEFAULT_PAGE_SIZE as u64);
    if size == 0 {
      return Err(anyhow!(
        "tasks.page_size must be at \
         least 1"
      ));
    }
    Ok(size as usize)
  }

  pub fn toast_duration(
    &self
  ) -> anyhow::Result<Duration> {
    Ok(Duration::from_millis(
      self
        .get_u64("notify.duration_ms")?
        .unwrap_or(1200)
    ))
  }

  pub fn http_timeout(
    &self
  ) -> anyhow::Result<Duration> {
    Ok(Duration::from_secs(
      self
        .get_u64("http.timeout_secs")?
        .unwrap_or(30)
    ))
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_clearrc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(clearrc_env) =
    std::env::var(CLEARRC_ENV_VAR)
  {
    if clearrc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      clearrc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping ~/.clearrc"
    );
    return Ok(None);
  };
  let candidate = home.join(".clearrc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".clear"))
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> Option<bool> {
  match s.trim().to_ascii_lowercase().as_str()
  {
    | "1" | "y" | "yes" | "on" | "true" => {
      Some(true)
    }
    | "0" | "n" | "no" | "off" | "false" => {
      Some(false)
    }
    | _ => None
  }
}
