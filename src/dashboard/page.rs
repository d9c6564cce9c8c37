//! The single dashboard page. All data arrives through the JSON API.

const TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>HostWatch</title>
<script src="https://cdn.plot.ly/plotly-2.32.0.min.js"></script>
<style>
  body { font-family: system-ui, sans-serif; margin: 0; background: var(--bg); color: var(--fg); }
  body.light { --bg: #f5f6f8; --fg: #1d2330; --card: #ffffff; --muted: #6b7280; }
  body.dark { --bg: #121620; --fg: #e6e9ef; --card: #1c2230; --muted: #9aa3b2; }
  header { display: flex; gap: 1rem; align-items: center; padding: 1rem 1.5rem; background: var(--card); }
  header h1 { font-size: 1.25rem; margin: 0 auto 0 0; }
  main { padding: 1rem 1.5rem; display: grid; gap: 1rem; }
  .cards { display: grid; grid-template-columns: repeat(auto-fit, minmax(14rem, 1fr)); gap: 1rem; }
  .card { background: var(--card); border-radius: 8px; padding: 1rem; }
  .card h2 { font-size: 0.9rem; color: var(--muted); margin: 0 0 0.5rem; }
  .value { font-size: 1.4rem; }
  .gauges { display: grid; grid-template-columns: repeat(3, 1fr); }
  .alert { padding: 0.5rem 0.75rem; border-radius: 6px; margin-bottom: 0.4rem; }
  .alert.warning { background: #fff4ce; color: #6b4e00; }
  .alert.critical { background: #fde2e1; color: #8a1c14; }
  .service.ok { color: #1a7f37; }
  .service.down { color: #cf222e; }
  #tabs button.active { font-weight: bold; }
</style>
</head>
<body class="light">
<header>
  <h1>HostWatch</h1>
  <select id="host"></select>
  <span id="updated"></span>
  <a id="export" href="#">Export</a>
  <button id="theme">Toggle theme</button>
</header>
<main>
  <section id="alerts"></section>
  <section class="cards">
    <div class="card"><h2>Upload</h2><div class="value" id="upload">N/A</div></div>
    <div class="card"><h2>Download</h2><div class="value" id="download">N/A</div></div>
    <div class="card"><h2>Speed test</h2><div class="value" id="speedtest">N/A</div></div>
    <div class="card"><h2>Local IP</h2><div class="value" id="local_ip">N/A</div></div>
    <div class="card"><h2>Public IP</h2><div class="value" id="public_ip">N/A</div></div>
  </section>
  <section class="card">
    <div id="tabs"><button data-tab="system" class="active">System</button><button data-tab="network">Network</button><button data-tab="services">Services</button></div>
    <div id="tab-system"><div class="gauges"><div id="g-cpu"></div><div id="g-mem"></div><div id="g-disk"></div></div><div id="c-system"></div></div>
    <div id="tab-network" hidden><div id="c-network"></div></div>
    <div id="tab-services" hidden><ul id="services"></ul></div>
  </section>
</main>
<script>
const REFRESH_MS = __REFRESH_SECONDS__ * 1000;
const WINDOW_SECONDS = __WINDOW_SECONDS__;
const hostSelect = document.getElementById("host");
const text = (id, value) => { document.getElementById(id).textContent = value; };
const api = (path) => fetch(path).then(r => r.ok ? r.json() : null).catch(() => null);
const enc = encodeURIComponent;

function gauge(el, title, value) {
  Plotly.react(el, [{ type: "indicator", mode: "gauge+number", value: value ?? 0,
    title: { text: title }, gauge: { axis: { range: [0, 100] } } }],
    { height: 220, margin: { t: 40, b: 10, l: 20, r: 20 }, paper_bgcolor: "rgba(0,0,0,0)" });
}

function chart(el, data, fields, title) {
  const traces = fields.filter(f => data.series[f]).map(f => ({ x: data.timestamps, y: data.series[f], name: f, mode: "lines" }));
  Plotly.react(el, traces, { title, height: 320, paper_bgcolor: "rgba(0,0,0,0)" });
}

async function loadHosts() {
  const hosts = await api("/api/hosts") || [];
  const current = hostSelect.value;
  hostSelect.innerHTML = hosts.map(h => `<option>${h}</option>`).join("");
  if (hosts.includes(current)) hostSelect.value = current;
}

async function refresh() {
  await loadHosts();
  const host = hostSelect.value;
  if (!host) return;
  const base = `/api/hosts/${enc(host)}`;
  document.getElementById("export").href = `${base}/export`;

  const latest = await api(`${base}/latest`);
  if (latest) {
    text("updated", `Last update: ${latest.timestamp}`);
    text("upload", latest.upload);
    text("download", latest.download);
    text("speedtest", `${latest.speed_test_download} / ${latest.speed_test_upload}`);
    text("local_ip", latest.local_ip);
    text("public_ip", latest.public_ip);
    gauge("g-cpu", "CPU", latest.gauges.cpu_usage);
    gauge("g-mem", "Memory", latest.gauges.memory_usage);
    gauge("g-disk", "Disk", latest.gauges.disk_usage);
  }

  const fields = ["cpu_usage", "memory_usage", "disk_usage", "upload_speed_mbps", "download_speed_mbps"];
  const history = await api(`${base}/history?window=${WINDOW_SECONDS}&fields=${fields.join(",")}`);
  if (history) {
    chart("c-system", history, fields.slice(0, 3), "Utilization (%)");
    chart("c-network", history, fields.slice(3), "Throughput (Mbps)");
  }

  const services = await api(`${base}/services`) || [];
  document.getElementById("services").innerHTML = services
    .map(s => `<li class="service ${s.running ? "ok" : "down"}">${s.name}: ${s.status}</li>`).join("");

  const alerts = await api(`${base}/alerts`) || [];
  document.getElementById("alerts").innerHTML = alerts
    .map(a => `<div class="alert ${a.level}">${a.message}</div>`).join("");
}

document.querySelectorAll("#tabs button").forEach(button => button.addEventListener("click", () => {
  document.querySelectorAll("#tabs button").forEach(b => b.classList.toggle("active", b === button));
  ["system", "network", "services"].forEach(t => { document.getElementById(`tab-${t}`).hidden = t !== button.dataset.tab; });
}));
document.getElementById("theme").addEventListener("click", () => {
  document.body.classList.toggle("dark");
  document.body.classList.toggle("light");
});
hostSelect.addEventListener("change", refresh);
refresh();
setInterval(refresh, REFRESH_MS);
</script>
</body>
</html>
"##;

/// Renders the page with the polling interval and chart window filled in.
pub fn render(refresh_seconds: u64, window_seconds: u64) -> String {
    TEMPLATE
        .replace("__REFRESH_SECONDS__", &refresh_seconds.to_string())
        .replace("__WINDOW_SECONDS__", &window_seconds.to_string())
}
