use crate::domain::SpreadsheetConfig;

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
body {{ font-family: system-ui, sans-serif; max-width: 42rem; margin: 2rem auto; padding: 0 1rem; }}
input, select, button {{ font: inherit; padding: .4rem; margin: .2rem 0; width: 100%; box-sizing: border-box; }}
pre {{ background: #f4f4f4; padding: .8rem; white-space: pre-wrap; word-break: break-all; }}
</style>
</head>
<body>
{body}
</body>
</html>
"#,
        title = escape_html(title),
    )
}

/// Lets a user exchange the link for access. The credential is the bearer
/// token issued by the accounts service.
pub fn join_page(config: &SpreadsheetConfig) -> String {
    let title = if config.title.is_empty() {
        "a spreadsheet".to_string()
    } else {
        format!("&ldquo;{}&rdquo;", escape_html(&config.title))
    };
    let body = format!(
        r#"<h1>Join {title}</h1>
<p>You will get <b>{role}</b> access. Enter the Google address that should receive it.</p>
<form id="join">
<label>Account token <input name="credential" type="password" required></label>
<label>Google email <input name="email" type="email" placeholder="you@gmail.com"></label>
<button type="submit">Join</button>
</form>
<pre id="result" hidden></pre>
<script>
document.getElementById("join").addEventListener("submit", async (event) => {{
  event.preventDefault();
  const form = new FormData(event.target);
  const response = await fetch(window.location.pathname, {{
    method: "POST",
    headers: {{ "Content-Type": "application/json", "Authorization": "Bearer " + form.get("credential") }},
    body: JSON.stringify({{ email: form.get("email") || null }}),
  }});
  const result = document.getElementById("result");
  result.hidden = false;
  result.textContent = JSON.stringify(await response.json(), null, 2);
}});
</script>"#,
        role = config.role,
    );
    layout("Join spreadsheet", &body)
}

pub fn not_found_page() -> String {
    layout(
        "Link not found",
        "<h1>Link not found</h1>\n<p>This join link does not exist, has expired or was already used. Ask the spreadsheet owner for a new one.</p>",
    )
}

pub fn admin_page(service_account_email: &str) -> String {
    let body = format!(
        r#"<h1>Sheets Guard</h1>
<p>Share your spreadsheet with <code>{email}</code> as an editor, then register it here.</p>
<label>Account token <input id="token" type="password"></label>
<h2>Register</h2>
<form id="register">
<label>Spreadsheet id <input name="spreadsheet_id" required></label>
<label>Title <input name="title"></label>
<label>Role <select name="role"><option value="writer">writer</option><option value="reader">reader</option></select></label>
<button type="submit">Register</button>
</form>
<h2>Your spreadsheets</h2>
<button id="list">Refresh</button>
<pre id="result"></pre>
<script>
const call = async (method, path, body) => {{
  const response = await fetch(path, {{
    method,
    headers: {{ "Content-Type": "application/json", "Authorization": "Bearer " + document.getElementById("token").value }},
    body: body ? JSON.stringify(body) : undefined,
  }});
  document.getElementById("result").textContent = JSON.stringify(await response.json(), null, 2);
}};
document.getElementById("register").addEventListener("submit", (event) => {{
  event.preventDefault();
  const form = new FormData(event.target);
  call("POST", "/spreadsheets", {{
    spreadsheet_id: form.get("spreadsheet_id"),
    title: form.get("title"),
    role: form.get("role"),
  }});
}});
document.getElementById("list").addEventListener("click", () => call("GET", "/spreadsheets"));
</script>"#,
        email = escape_html(service_account_email),
    );
    layout("Sheets Guard admin", &body)
}
