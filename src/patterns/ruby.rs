/// Built-in Ruby signatures.
pub const DOCUMENT: &str = r##"
[COMMAND_INJECTION]
description: Shell execution with interpolation
patterns:
- \b(system|exec|spawn)\s*\(?\s*["'].*#\{
- %x\{
- `.*#\{

[REMOTE_CODE_EXECUTION]
description: Dynamic evaluation
patterns:
- \beval\s*\(?
- \b(instance_eval|class_eval|module_eval)\b
- \.send\s*\(\s*params

[INSECURE_DESERIALIZATION]
description: Unsafe object loading
patterns:
- Marshal\.load\s*\(
- YAML\.load\s*\(

[SQL_INJECTION]
description: Interpolated SQL fragments
patterns:
- \.(where|find_by_sql|execute)\s*\(\s*["'].*#\{

[PATH_TRAVERSAL]
description: File access from params
patterns:
- File\.(open|read)\s*\(\s*.*params
- send_file\s*\(\s*.*params
"##;
