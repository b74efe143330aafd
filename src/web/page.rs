/// The single page: upload, text controls, three result panes and a download link
pub(super) const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Text Behind Image</title>
<style>
  body { font-family: system-ui, sans-serif; margin: 2rem auto; max-width: 1100px; padding: 0 1rem; }
  form { display: grid; gap: .75rem; grid-template-columns: max-content 1fr; align-items: center; }
  .panes { display: grid; gap: 1rem; grid-template-columns: repeat(auto-fit, minmax(300px, 1fr)); margin-top: 1.5rem; }
  .pane img { max-width: 100%; border: 1px solid #ddd; background: repeating-conic-gradient(#eee 0% 25%, #fff 0% 50%) 50% / 20px 20px; }
  .hidden { display: none; }
  #error { color: #b00020; }
  #notice { color: #8a6d00; }
</style>
</head>
<body>
<h1>Text Behind Image</h1>
<form id="form">
  <label for="image">Choose an image...</label>
  <input id="image" name="image" type="file" accept="image/jpeg,image/png" required>
  <label for="text">Enter text</label>
  <input id="text" name="text" type="text" value="Your Text Here">
  <label for="font">Select font</label>
  <select id="font" name="font">
    <option value="arial.ttf" selected>arial.ttf</option>
    <option value="times.ttf">times.ttf</option>
    <option value="georgia.ttf">georgia.ttf</option>
  </select>
  <label for="font_size">Font size <output id="size_value">100</output></label>
  <input id="font_size" name="font_size" type="range" min="10" max="200" value="100">
  <label for="font_color">Font color</label>
  <input id="font_color" name="font_color" type="color" value="#ffffff">
  <span></span>
  <button type="submit">Create</button>
</form>
<p id="status"></p>
<p id="error"></p>
<p id="notice" class="hidden">The selected font is not installed; a small built-in font was used instead.</p>
<div class="panes">
  <div class="pane hidden" id="original_pane"><h2>Original Image</h2><img id="original" alt="Original image"></div>
  <div class="pane hidden" id="removed_pane"><h2>Background Removed</h2><img id="removed" alt="Background removed"></div>
  <div class="pane hidden" id="final_pane"><h2>Final Image</h2><img id="final" alt="Final image">
    <p><a id="download" download="text_behind_image.png">Download Image</a></p></div>
</div>
<script>
const $ = (id) => document.getElementById(id);
const show = (id, visible) => $(id).classList.toggle("hidden", !visible);

$("font_size").addEventListener("input", (e) => { $("size_value").textContent = e.target.value; });

$("image").addEventListener("change", () => {
  const file = $("image").files[0];
  ["removed_pane", "final_pane", "notice"].forEach((id) => show(id, false));
  $("error").textContent = "";
  if (file) { $("original").src = URL.createObjectURL(file); show("original_pane", true); }
});

async function post(url, body) {
  const response = await fetch(url, { method: "POST", body });
  if (!response.ok) {
    let message = "An error occurred: HTTP " + response.status;
    try { message = (await response.json()).error || message; } catch (_) {}
    throw new Error(message);
  }
  return response;
}

$("form").addEventListener("submit", async (event) => {
  event.preventDefault();
  const file = $("image").files[0];
  if (!file) return;
  ["removed_pane", "final_pane", "notice"].forEach((id) => show(id, false));
  $("error").textContent = "";

  try {
    $("status").textContent = "Removing background...";
    const upload = new FormData();
    upload.append("image", file);
    const removed = await (await post("/api/remove-background", upload)).blob();
    $("removed").src = URL.createObjectURL(removed);
    show("removed_pane", true);

    $("status").textContent = "Adding text...";
    const compose = new FormData($("form"));
    compose.set("image", removed, "background_removed.png");
    const response = await post("/api/compose", compose);
    show("notice", response.headers.get("x-font-fallback") === "true");
    const url = URL.createObjectURL(await response.blob());
    $("final").src = url;
    $("download").href = url;
    show("final_pane", true);
  } catch (e) {
    $("error").textContent = e.message;
  } finally {
    $("status").textContent = "";
  }
});
</script>
</body>
</html>
"##;
